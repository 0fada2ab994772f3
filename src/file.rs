//! Binary download payload.

/// Characters that are not allowed in a download filename on any common platform.
const INVALID_FILENAME_CHARS: &[char] = &['"', '<', '>', '|', ':', '*', '?', '\\', '/'];

/// File content returned from a handler; rendered as an attachment download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResponse {
    pub content: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl FileResponse {
    /// The filename is sanitised with [`replace_invalid_filename_characters`].
    pub fn new(content: impl Into<Vec<u8>>, filename: Option<&str>, content_type: Option<&str>) -> Self {
        FileResponse {
            content: content.into(),
            filename: filename.map(|f| replace_invalid_filename_characters(f, '_')),
            content_type: content_type.map(str::to_string),
        }
    }

    pub fn set_filename(&mut self, filename: &str) {
        self.filename = Some(replace_invalid_filename_characters(filename, '_'));
    }
}

/// Replace control characters and path/reserved characters in `filename` with `replace_char`.
/// e.g. "a:b*c.txt" -> "a_b_c.txt"
pub fn replace_invalid_filename_characters(filename: &str, replace_char: char) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_control() && c != '\u{7f}' || INVALID_FILENAME_CHARS.contains(&c) {
                replace_char
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_reserved_characters() {
        assert_eq!(replace_invalid_filename_characters("a:b*c.txt", '_'), "a_b_c.txt");
        assert_eq!(replace_invalid_filename_characters("dir/x\\y?.csv", '-'), "dir-x-y-.csv");
        assert_eq!(replace_invalid_filename_characters("tab\there", '_'), "tab_here");
        assert_eq!(replace_invalid_filename_characters("report 2024.pdf", '_'), "report 2024.pdf");
    }

    #[test]
    fn new_sanitises_filename() {
        let file = FileResponse::new(b"x".to_vec(), Some("q<1>.txt"), None);
        assert_eq!(file.filename.as_deref(), Some("q_1_.txt"));
        assert!(FileResponse::new(Vec::new(), None, None).filename.is_none());
    }

    #[test]
    fn sanitised_filename_keeps_its_length() {
        for name in ["a:b*c.txt", "résumé<1>.pdf", "\u{1}\u{2}x", "\"quoted\"|piped?", "ok.csv"] {
            let sanitised = replace_invalid_filename_characters(name, '_');
            assert_eq!(sanitised.chars().count(), name.chars().count(), "{name:?}");
        }
    }
}
