use std::collections::BTreeMap;
use std::path::Path;
use futures::future::join_all;
use tracing::{debug, warn};
use crate::errors::FuzzError;
use crate::matching::MatchEngine;
use crate::models::{ContentId, IterationResult};
use crate::queue::VulnerabilitySink;
use super::files::FileDeltaReader;
use super::kinds::{Observable, Scanner};

/// Registered scanners grouped by the observable they consume.
#[derive(Debug, Clone, Default)]
pub struct Monitors {
    results: Vec<Scanner>,
    process: Vec<Scanner>,
    files: BTreeMap<String, Vec<Scanner>>,
    dns: Vec<Scanner>,
}

impl Monitors {
    pub fn from_scanners<I: IntoIterator<Item = Scanner>>(scanners: I) -> Self {
        let mut monitors = Self::default();
        for scanner in scanners {
            match scanner.observable() {
                Observable::ResultOutput | Observable::ResultErrors => monitors.results.push(scanner),
                Observable::ProcessList => monitors.process.push(scanner),
                Observable::DnsQuery => monitors.dns.push(scanner),
                Observable::FileDelta => {
                    let filename = scanner.filename().unwrap_or_default().to_string();
                    monitors.files.entry(filename).or_default().push(scanner);
                }
            }
        }
        monitors
    }

    pub fn result_scanners(&self) -> &[Scanner] {
        &self.results
    }

    pub fn has_process_scanners(&self) -> bool {
        !self.process.is_empty()
    }

    pub fn has_dns_scanners(&self) -> bool {
        !self.dns.is_empty()
    }

    pub fn watched_files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Every result scanner against one iteration result. Returns the number
    /// of findings reported.
    pub async fn scan_result(
        &self,
        engine: &MatchEngine,
        sink: &dyn VulnerabilitySink,
        result: &IterationResult,
    ) -> Result<usize, FuzzError> {
        let iteration_id = result.iteration_id()?;
        let scans = self.results.iter().map(|scanner| {
            let subject = match scanner.observable() {
                Observable::ResultErrors => result.stderr.as_str(),
                _ => result.output.output.as_str(),
            };
            run_scanner(engine, sink, scanner, subject, Some(iteration_id))
        });
        Ok(join_all(scans).await.into_iter().sum())
    }

    pub async fn scan_process_list(
        &self,
        engine: &MatchEngine,
        sink: &dyn VulnerabilitySink,
        ps_output: &str,
    ) -> usize {
        let scans = self
            .process
            .iter()
            .map(|scanner| run_scanner(engine, sink, scanner, ps_output, None));
        join_all(scans).await.into_iter().sum()
    }

    /// Appended contents of every watched file against its scanners.
    pub async fn scan_files(
        &self,
        engine: &MatchEngine,
        sink: &dyn VulnerabilitySink,
        reader: &FileDeltaReader,
    ) -> usize {
        let reads = self.files.keys().map(|filename| async move {
            (filename, reader.read_delta(Path::new(filename)).await)
        });

        let mut found = 0;
        for (filename, delta) in join_all(reads).await {
            let contents = match delta {
                Ok(Some(contents)) => contents,
                Ok(None) => {
                    if reader.mark_missing(Path::new(filename)) {
                        warn!(file = %filename, "Watched file does not exist, skipping scan");
                    } else {
                        debug!(file = %filename, "Watched file still missing");
                    }
                    continue;
                }
                Err(e) => {
                    warn!(file = %filename, error = %e, "Failed to read watched file");
                    continue;
                }
            };
            if contents.is_empty() {
                continue;
            }
            if let Some(scanners) = self.files.get(filename) {
                for scanner in scanners {
                    found += run_scanner(engine, sink, scanner, &contents, None).await;
                }
            }
        }
        found
    }

    pub async fn scan_dns_query(
        &self,
        engine: &MatchEngine,
        sink: &dyn VulnerabilitySink,
        query_name: &str,
    ) -> usize {
        let scans = self
            .dns
            .iter()
            .map(|scanner| run_scanner(engine, sink, scanner, query_name, None));
        join_all(scans).await.into_iter().sum()
    }
}

/// One scanner over one subject. Failures are logged; a broken scanner never
/// stops the others.
async fn run_scanner(
    engine: &MatchEngine,
    sink: &dyn VulnerabilitySink,
    scanner: &Scanner,
    subject: &str,
    iteration_id: Option<ContentId>,
) -> usize {
    let vulnerabilities = match scanner.detect(engine, subject, iteration_id) {
        Ok(found) => found,
        Err(e) => {
            warn!(kind = scanner.kind(), phrase = %scanner.phrase(), error = %e, "Scanner failed");
            return 0;
        }
    };
    if vulnerabilities.is_empty() {
        return 0;
    }

    let count = vulnerabilities.len();
    match sink.add(vulnerabilities).await {
        Ok(()) => {
            debug!(kind = scanner.kind(), findings = count, "Scanner reported findings");
            count
        }
        Err(e) => {
            warn!(kind = scanner.kind(), error = %e, "Failed to record findings");
            0
        }
    }
}
