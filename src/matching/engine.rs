use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use tracing::warn;
use crate::errors::FuzzError;
use crate::utils::truncate_dump;
use super::markup::{filter_locations, find_markup_locations};

const PAYLOAD_ID_GROUP: &str = "payload_id";
const SLOW_MATCH: Duration = Duration::from_secs(5);

/// What to look for in a subject string.
#[derive(Debug, Clone, Copy)]
pub struct PhraseQuery<'a> {
    pub phrase: &'a str,
    pub is_regex: bool,
    pub payload_marker: &'a str,
    /// Glob over markup locations; matches outside it are dropped.
    pub context_filter: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub detection_result: String,
    pub payload_id: Option<String>,
    pub context_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    phrase: String,
    marker: Option<String>,
    is_regex: bool,
}

/// Phrase matcher with a compiled-regex cache owned by the instance.
#[derive(Default)]
pub struct MatchEngine {
    cache: DashMap<CacheKey, Arc<Regex>>,
}

impl MatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_patterns(&self) -> usize {
        self.cache.len()
    }

    /// Compiles (or reuses) the regex for a query. The boolean tells whether
    /// the regex carries the payload-id group.
    fn compile(&self, query: &PhraseQuery<'_>) -> Result<(Arc<Regex>, bool), FuzzError> {
        let split = if query.payload_marker.is_empty() {
            None
        } else {
            query.phrase.split_once(query.payload_marker)
        };

        let key = CacheKey {
            phrase: query.phrase.to_string(),
            marker: split.map(|_| query.payload_marker.to_string()),
            is_regex: query.is_regex,
        };
        if let Some(regex) = self.cache.get(&key) {
            return Ok((regex.clone(), split.is_some()));
        }

        // prefix and suffix are taken as regex fragments even for literal phrases
        let source = match split {
            Some((prefix, suffix)) => {
                format!("({})(?P<{}>[0-9]+)({})", prefix, PAYLOAD_ID_GROUP, suffix)
            }
            None if query.is_regex => query.phrase.to_string(),
            None => regex::escape(query.phrase),
        };
        let regex = Arc::new(RegexBuilder::new(&source).dot_matches_new_line(true).build()?);
        self.cache.insert(key, regex.clone());
        Ok((regex, split.is_some()))
    }

    /// Correlated phrases report every match; plain phrases report the first
    /// one only.
    pub fn find(&self, query: &PhraseQuery<'_>, subject: &str) -> Result<Vec<Detection>, FuzzError> {
        let started = Instant::now();
        let (regex, correlated) = self.compile(query)?;

        let mut detections = Vec::new();
        let captures: Vec<regex::Captures> = if correlated {
            regex.captures_iter(subject).collect()
        } else {
            regex.captures(subject).into_iter().collect()
        };

        for caps in captures {
            let Some(whole) = caps.get(0) else { continue };
            let detection_result = whole.as_str().trim_matches('"').to_string();
            let payload_id = caps.name(PAYLOAD_ID_GROUP).map(|m| m.as_str().to_string());

            let context_location = match query.context_filter {
                Some(filter) => {
                    let locations = find_markup_locations(subject, &detection_result);
                    let kept = filter_locations(&locations, filter);
                    if kept.is_empty() {
                        continue;
                    }
                    Some(kept.join(", "))
                }
                None => None,
            };

            detections.push(Detection { detection_result, payload_id, context_location });
        }

        let elapsed = started.elapsed();
        if elapsed > SLOW_MATCH {
            warn!(
                phrase = %query.phrase,
                elapsed_ms = elapsed.as_millis() as u64,
                subject = %truncate_dump(subject),
                "Slow phrase match"
            );
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "§ID§";

    fn query(phrase: &str, is_regex: bool) -> PhraseQuery<'_> {
        PhraseQuery { phrase, is_regex, payload_marker: MARKER, context_filter: None }
    }

    #[test]
    fn test_marker_phrase_extracts_payload_id() {
        let engine = MatchEngine::new();
        let found = engine
            .find(&query("<x§ID§>", false), "aa <x123> bb <x456> <x>")
            .unwrap();
        let ids: Vec<_> = found.iter().map(|d| d.payload_id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["123", "456"]);
        assert_eq!(found[0].detection_result, "<x123>");
    }

    #[test]
    fn test_marker_match_spans_newlines() {
        let engine = MatchEngine::new();
        let found = engine.find(&query("start.*?§ID§", true), "start\nmiddle 77").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload_id.as_deref(), Some("77"));
    }

    #[test]
    fn test_plain_phrase_reports_first_match_only() {
        let engine = MatchEngine::new();
        let found = engine.find(&query("a.b", false), "a.b a.b axb").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].detection_result, "a.b");
        assert!(found[0].payload_id.is_none());
    }

    #[test]
    fn test_literal_phrase_is_escaped() {
        let engine = MatchEngine::new();
        assert!(engine.find(&query("a.b", false), "axb").unwrap().is_empty());
        assert_eq!(engine.find(&query("a.b", true), "axb").unwrap().len(), 1);
    }

    #[test]
    fn test_detection_result_strips_quotes() {
        let engine = MatchEngine::new();
        let found = engine.find(&query("\"quoted\"", false), "say \"quoted\"").unwrap();
        assert_eq!(found[0].detection_result, "quoted");
    }

    #[test]
    fn test_context_filter_drops_outside_matches() {
        let engine = MatchEngine::new();
        let subject = r#"<p>k9</p><script>var x = "k7";</script>"#;
        let mut q = query("k§ID§", false);
        q.context_filter = Some("script.text");
        let found = engine.find(&q, subject).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload_id.as_deref(), Some("7"));
        assert_eq!(found[0].context_location.as_deref(), Some("script.text"));
    }

    #[test]
    fn test_regex_cache_reused() {
        let engine = MatchEngine::new();
        engine.find(&query("abc", false), "abc").unwrap();
        engine.find(&query("abc", false), "xabc").unwrap();
        engine.find(&query("abc", true), "abc").unwrap();
        assert_eq!(engine.cached_patterns(), 2);
    }

    #[test]
    fn test_invalid_regex_is_pattern_error() {
        let engine = MatchEngine::new();
        let err = engine.find(&query("(unclosed", true), "x").unwrap_err();
        assert!(matches!(err, FuzzError::Pattern(_)));
    }
}
