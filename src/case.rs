//! Case conversion for route names: type names (PascalCase) -> kebab-case path segments.

/// Convert an identifier to lower kebab-case.
/// e.g. "WidgetPart" -> "widget-part", "HTTPServer" -> "http-server", "snake_case" -> "snake-case"
///
/// A word boundary is placed before an upper-case letter that follows a lower-case letter or a
/// digit, and before the last upper-case letter of an acronym that is followed by lower case.
pub fn to_kebab_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 && !out.is_empty() && !out.ends_with('-') {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push('-');
            }
        }
        out.extend(c.to_lowercase());
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case_to_kebab() {
        assert_eq!(to_kebab_case("Widget"), "widget");
        assert_eq!(to_kebab_case("WidgetPart"), "widget-part");
        assert_eq!(to_kebab_case("widgetPart"), "widget-part");
    }

    #[test]
    fn acronyms_and_digits() {
        assert_eq!(to_kebab_case("HTTPServer"), "http-server");
        assert_eq!(to_kebab_case("IOError"), "io-error");
        assert_eq!(to_kebab_case("Order2Line"), "order2-line");
        assert_eq!(to_kebab_case("API"), "api");
    }

    #[test]
    fn separators_collapse() {
        assert_eq!(to_kebab_case("snake_case"), "snake-case");
        assert_eq!(to_kebab_case("Already-Kebab"), "already-kebab");
        assert_eq!(to_kebab_case("two  words"), "two-words");
    }
}
