use serde::{Deserialize, Serialize};
use crate::errors::FuzzError;
use crate::matching::{MatchEngine, PhraseQuery};
use crate::models::{content_id, ContentId, Vulnerability};

/// Phrase shared by every scanner kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhraseScanner {
    pub phrase: String,
    pub payload_marker: String,
    #[serde(default)]
    pub is_regex: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextScanner {
    pub phrase: String,
    pub payload_marker: String,
    #[serde(default)]
    pub is_regex: bool,
    /// Glob over markup locations, e.g. `script.text` or `*.href.value`.
    pub context_location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileScanner {
    pub phrase: String,
    pub payload_marker: String,
    #[serde(default)]
    pub is_regex: bool,
    pub filename: String,
}

/// The closed set of detectors. The tag is what the scanner store persists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scanner {
    /// Response body of an iteration.
    ResultOutput(PhraseScanner),
    /// Harness stderr of an iteration.
    ResultErrors(PhraseScanner),
    /// Response body, restricted to markup locations.
    ContextResultOutput(ContextScanner),
    /// `ps -ef` snapshot.
    ProcessOutput(PhraseScanner),
    /// Bytes appended to a watched file.
    FileContents(FileScanner),
    /// Names queried against the passive DNS listener.
    DnsQuery(PhraseScanner),
}

/// Which observable a scanner consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observable {
    ResultOutput,
    ResultErrors,
    ProcessList,
    FileDelta,
    DnsQuery,
}

impl Scanner {
    pub fn kind(&self) -> &'static str {
        match self {
            Scanner::ResultOutput(_) => "result_output",
            Scanner::ResultErrors(_) => "result_errors",
            Scanner::ContextResultOutput(_) => "context_result_output",
            Scanner::ProcessOutput(_) => "process_output",
            Scanner::FileContents(_) => "file_contents",
            Scanner::DnsQuery(_) => "dns_query",
        }
    }

    pub fn observable(&self) -> Observable {
        match self {
            Scanner::ResultOutput(_) | Scanner::ContextResultOutput(_) => Observable::ResultOutput,
            Scanner::ResultErrors(_) => Observable::ResultErrors,
            Scanner::ProcessOutput(_) => Observable::ProcessList,
            Scanner::FileContents(_) => Observable::FileDelta,
            Scanner::DnsQuery(_) => Observable::DnsQuery,
        }
    }

    pub fn scanner_id(&self) -> Result<ContentId, FuzzError> {
        content_id(self)
    }

    pub fn phrase(&self) -> &str {
        self.query().phrase
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Scanner::FileContents(s) => Some(&s.filename),
            _ => None,
        }
    }

    fn query(&self) -> PhraseQuery<'_> {
        match self {
            Scanner::ResultOutput(s)
            | Scanner::ResultErrors(s)
            | Scanner::ProcessOutput(s)
            | Scanner::DnsQuery(s) => PhraseQuery {
                phrase: &s.phrase,
                is_regex: s.is_regex,
                payload_marker: &s.payload_marker,
                context_filter: None,
            },
            Scanner::ContextResultOutput(s) => PhraseQuery {
                phrase: &s.phrase,
                is_regex: s.is_regex,
                payload_marker: &s.payload_marker,
                context_filter: Some(&s.context_location),
            },
            Scanner::FileContents(s) => PhraseQuery {
                phrase: &s.phrase,
                is_regex: s.is_regex,
                payload_marker: &s.payload_marker,
                context_filter: None,
            },
        }
    }

    /// Runs the scanner over `subject` and builds one vulnerability per match.
    pub fn detect(
        &self,
        engine: &MatchEngine,
        subject: &str,
        iteration_result_id: Option<ContentId>,
    ) -> Result<Vec<Vulnerability>, FuzzError> {
        let scanner_id = self.scanner_id()?;
        let detections = engine.find(&self.query(), subject)?;
        Ok(detections
            .into_iter()
            .map(|d| {
                Vulnerability::new(
                    d.detection_result,
                    d.payload_id,
                    d.context_location,
                    scanner_id,
                    iteration_result_id,
                )
            })
            .collect())
    }

    /// Splits a scanner into the `(kind, obj)` pair the store persists.
    pub fn to_stored(&self) -> Result<(&'static str, String), FuzzError> {
        let obj = match self {
            Scanner::ResultOutput(s)
            | Scanner::ResultErrors(s)
            | Scanner::ProcessOutput(s)
            | Scanner::DnsQuery(s) => serde_json::to_string(s)?,
            Scanner::ContextResultOutput(s) => serde_json::to_string(s)?,
            Scanner::FileContents(s) => serde_json::to_string(s)?,
        };
        Ok((self.kind(), obj))
    }

    /// Rebuilds a scanner from its persisted tag and body.
    pub fn from_stored(kind: &str, obj: &str) -> Result<Self, FuzzError> {
        Ok(match kind {
            "result_output" => Scanner::ResultOutput(serde_json::from_str(obj)?),
            "result_errors" => Scanner::ResultErrors(serde_json::from_str(obj)?),
            "context_result_output" => Scanner::ContextResultOutput(serde_json::from_str(obj)?),
            "process_output" => Scanner::ProcessOutput(serde_json::from_str(obj)?),
            "file_contents" => Scanner::FileContents(serde_json::from_str(obj)?),
            "dns_query" => Scanner::DnsQuery(serde_json::from_str(obj)?),
            other => return Err(FuzzError::Scanner(format!("Unknown scanner kind: {}", other))),
        })
    }
}
