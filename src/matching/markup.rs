use glob::Pattern;
use scraper::{ElementRef, Html};
use tracing::warn;

/// Locations inside markup where `phrase` occurs, as
/// `tag.text`, `tag.attr.value`, `tag.attr` or `tag` (phrase inside a tag name).
pub fn find_markup_locations(contents: &str, phrase: &str) -> Vec<String> {
    let lowered = phrase.to_lowercase();
    let document;
    let elements: Vec<ElementRef> = if contents.to_ascii_lowercase().contains("<html") {
        document = Html::parse_document(contents);
        document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect()
    } else {
        // fragments get a synthetic root element that must not be reported
        document = Html::parse_fragment(contents);
        document
            .root_element()
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .collect()
    };

    let mut locations = Vec::new();
    for element in elements {
        let name = element.value().name();
        let text: String = element.text().collect();
        if text.contains(phrase) {
            locations.push(format!("{}.text", name));
        }
        if name.contains(&lowered) {
            locations.push("tag".to_string());
        }
        for (attr, value) in element.value().attrs() {
            if value.contains(phrase) {
                locations.push(format!("{}.{}.value", name, attr));
            }
            if attr.contains(&lowered) {
                locations.push(format!("{}.attr", name));
            }
        }
    }
    locations
}

/// Locations matching the glob `filter`. An invalid filter matches nothing.
pub fn filter_locations(locations: &[String], filter: &str) -> Vec<String> {
    let pattern = match Pattern::new(filter) {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!(filter = %filter, error = %e, "Invalid context location filter");
            return Vec::new();
        }
    };
    locations.iter().filter(|l| pattern.matches(l)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_attribute_locations() {
        let html = r#"<div><a href="/x?q=P123">go P123</a><script>var a = "P123";</script></div>"#;
        let locations = find_markup_locations(html, "P123");
        assert!(locations.contains(&"a.href.value".to_string()));
        assert!(locations.contains(&"a.text".to_string()));
        assert!(locations.contains(&"script.text".to_string()));
        assert!(locations.contains(&"div.text".to_string()));
    }

    #[test]
    fn test_phrase_in_attribute_name() {
        let html = r#"<img onfuzz123="1" src="a.png">"#;
        let locations = find_markup_locations(html, "FUZZ123");
        assert_eq!(locations, vec!["img.attr".to_string()]);
    }

    #[test]
    fn test_full_document_includes_html_root() {
        let html = "<html><body><p>needle</p></body></html>";
        let locations = find_markup_locations(html, "needle");
        assert!(locations.contains(&"html.text".to_string()));
        assert!(locations.contains(&"p.text".to_string()));
    }

    #[test]
    fn test_filter_locations_glob() {
        let locations = vec!["a.href.value".to_string(), "script.text".to_string()];
        assert_eq!(filter_locations(&locations, "script.*"), vec!["script.text".to_string()]);
        assert_eq!(filter_locations(&locations, "*.value"), vec!["a.href.value".to_string()]);
        assert!(filter_locations(&locations, "style.text").is_empty());
    }
}
