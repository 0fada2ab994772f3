//! Shared application state for all routes.

use crate::services::ServiceProvider;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Finished container; routes resolve their handlers from it per request.
    pub services: Arc<ServiceProvider>,
}

impl AppState {
    pub fn new(services: Arc<ServiceProvider>) -> Self {
        AppState { services }
    }
}
