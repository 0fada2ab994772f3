//! Example consumer: a separate Rust project that uses slicer-sdk as a dependency.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`
//!
//! Routes (default prefix `api`, override with `API_ROUTE_PREFIX`):
//! - `GET|POST /api/book`, `GET|PUT|DELETE /api/book/:id`
//! - `GET /api/book-summary`, `GET /api/book-summary/:id`

use serde::{Deserialize, Serialize};
use slicer_sdk::{
    add_domain_types, add_endpoint_builder, add_endpoint_default_validated_handlers, add_entities,
    map_endpoint_builders, DomainToEntity, DomainTypeRegistry, EndpointBuilder, EndpointOptions,
    EndpointRouteBuilder, Entity, EntityRegistry, EntityStore, MemoryStore, MergeInto,
    ServiceCollection, TypeMappers,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Book {
    id: Uuid,
    title: String,
    author: String,
}

impl Entity for Book {
    type Key = Uuid;

    fn key(&self) -> Uuid {
        self.id
    }
}

/// Create payload; the id is assigned on insert.
#[derive(Deserialize)]
struct NewBook {
    title: String,
    author: String,
}

impl From<NewBook> for Book {
    fn from(new: NewBook) -> Self {
        Book {
            id: Uuid::new_v4(),
            title: new.title,
            author: new.author,
        }
    }
}

#[derive(Deserialize)]
struct Retitle {
    title: String,
}

impl MergeInto<Book> for Retitle {
    fn merge_into(self, target: &mut Book) {
        target.title = self.title;
    }
}

#[derive(Serialize)]
struct BookSummary {
    id: Uuid,
    summary: String,
}

impl From<Book> for BookSummary {
    fn from(book: Book) -> Self {
        BookSummary {
            id: book.id,
            summary: format!("{} by {}", book.title, book.author),
        }
    }
}

impl DomainToEntity for BookSummary {
    type Entity = Book;
}

struct BookEndpoints;

impl EndpointBuilder for BookEndpoints {
    fn build(&self, routes: &mut EndpointRouteBuilder) {
        routes
            .map_entity_route_group::<Book, Uuid>()
            .map_get_as_no_filter_queryable()
            .map_get_as_by_key()
            .map_post_as_insert::<NewBook>()
            .map_put_as_update_by_key::<Retitle>()
            .map_delete_as_by_key();
        routes
            .map_entity_domain_route_group_named::<Book, Uuid, BookSummary>("BookSummary")
            .map_get_as_no_filter_queryable()
            .map_get_as_by_key();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    slicer_sdk::init_tracing("slicer_sdk=info,example_consumer=info");

    let mut services = ServiceCollection::new();
    services.add_singleton(Arc::new(EndpointOptions::from_env()?));

    let mut entities = EntityRegistry::new();
    entities.register::<Book>()?;
    add_entities(&mut services, entities);
    let mut domains = DomainTypeRegistry::new();
    domains.register::<BookSummary>()?;
    add_domain_types(&mut services, domains);

    let books = MemoryStore::with_rows(vec![Book {
        id: Uuid::new_v4(),
        title: "The Rust Programming Language".into(),
        author: "Klabnik and Nichols".into(),
    }]);
    services.add_singleton::<dyn EntityStore<Book>>(Arc::new(books));

    let mut mappers = TypeMappers::new();
    mappers
        .add::<NewBook, Book>()
        .add::<Book, BookSummary>()
        .add_merge::<Retitle, Book>();
    services.add_singleton(Arc::new(mappers));

    add_endpoint_builder(&mut services, BookEndpoints);
    let report = add_endpoint_default_validated_handlers(&mut services)?;
    tracing::info!(handlers = report.registered.len(), "generic handlers registered");

    let app = map_endpoint_builders(Arc::new(services.build()))?;
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
