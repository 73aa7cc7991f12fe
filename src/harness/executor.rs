use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use async_trait::async_trait;
use futures::future::join_all;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error};
use crate::errors::FuzzError;
use crate::models::{AttackScenario, IterationResult};
use crate::utils::truncate_dump;
use super::protocol::{HarnessConfig, HarnessOutput};

/// Output of one harness invocation.
#[derive(Debug, Clone)]
pub struct HarnessRun {
    pub output: HarnessOutput,
    pub stderr: String,
}

#[async_trait]
pub trait Harness: Send + Sync {
    /// Runs one iteration of `config`.
    async fn execute(&self, config: &HarnessConfig) -> Result<HarnessRun, FuzzError>;
}

/// Harness run as a child process: `program args... <webroot_file>`, with the
/// JSON config on stdin and the JSON result on stdout.
pub struct SubprocessHarness {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl SubprocessHarness {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args, timeout }
    }

    async fn run(&self, config: &HarnessConfig, input: Vec<u8>) -> Result<(Vec<u8>, Vec<u8>), FuzzError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&config.webroot_file)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FuzzError::Harness(format!("Failed to start {}: {}", self.program.display(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // a separate task so a child that never reads stdin cannot stall us
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    debug!(error = %e, "Harness closed stdin early");
                }
            });
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| FuzzError::Harness(format!("Failed to wait for harness: {}", e)))?;
        Ok((output.stdout, output.stderr))
    }
}

#[async_trait]
impl Harness for SubprocessHarness {
    async fn execute(&self, config: &HarnessConfig) -> Result<HarnessRun, FuzzError> {
        let input = serde_json::to_vec(config)?;

        let (stdout, stderr) = match tokio::time::timeout(self.timeout, self.run(config, input)).await {
            Ok(result) => result?,
            Err(_) => {
                error!(
                    strategy = %config.strategy_name,
                    path = %config.path,
                    timeout_secs = self.timeout.as_secs(),
                    config = %truncate_dump(&serde_json::to_string(config).unwrap_or_default()),
                    "Timed out waiting for harness"
                );
                return Err(FuzzError::Timeout(format!(
                    "Harness exceeded {}s for {}",
                    self.timeout.as_secs(),
                    config.path
                )));
            }
        };

        let stderr = String::from_utf8_lossy(&stderr).into_owned();
        match serde_json::from_slice::<HarnessOutput>(&stdout) {
            Ok(output) => Ok(HarnessRun { output, stderr }),
            Err(e) => {
                error!(
                    strategy = %config.strategy_name,
                    path = %config.path,
                    payloads = ?config.payloads,
                    config = %truncate_dump(&serde_json::to_string(config).unwrap_or_default()),
                    stdout = %truncate_dump(&String::from_utf8_lossy(&stdout)),
                    stderr = %truncate_dump(&stderr),
                    error = %e,
                    "Could not parse harness response"
                );
                Err(FuzzError::HarnessOutput(format!(
                    "Invalid harness response for {}: {}",
                    config.path, e
                )))
            }
        }
    }
}

/// Outcome of running every iteration of a scenario. Failed iterations are
/// kept so callers can count or log them.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub iterations: Vec<Result<IterationResult, FuzzError>>,
}

impl ScenarioOutcome {
    /// Successful results and the number of failed iterations.
    pub fn partition(self) -> (Vec<IterationResult>, usize) {
        let mut results = Vec::new();
        let mut failed = 0;
        for iteration in self.iterations {
            match iteration {
                Ok(result) => results.push(result),
                Err(_) => failed += 1,
            }
        }
        (results, failed)
    }
}

/// Runs all iterations of `scenario` concurrently.
pub async fn execute_all(harness: &dyn Harness, scenario: &AttackScenario) -> ScenarioOutcome {
    let config = scenario.harness_config();
    let runs = (0..scenario.total_iterations).map(|iteration| {
        let config = &config;
        async move {
            let run = harness.execute(config).await?;
            Ok::<_, FuzzError>(IterationResult {
                scenario: scenario.clone(),
                iteration,
                output: run.output,
                stderr: run.stderr,
            })
        }
    });
    ScenarioOutcome { iterations: join_all(runs).await }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use serde_json::json;

    struct FlakyHarness {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Harness for FlakyHarness {
        async fn execute(&self, config: &HarnessConfig) -> Result<HarnessRun, FuzzError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 1 {
                return Err(FuzzError::Timeout("slow".into()));
            }
            let output = serde_json::from_value(json!({
                "first_http_line": "HTTP/1.1 200 OK",
                "method": "GET",
                "path": config.path,
                "headers": {},
                "output": format!("call {}", call),
                "PAYLOAD_GUIDs": [],
                "exec_time": 0.0
            }))?;
            Ok(HarnessRun { output, stderr: String::new() })
        }
    }

    fn scenario(iterations: u32) -> AttackScenario {
        AttackScenario {
            strategy_name: "s".into(),
            framework_handler: "h".into(),
            web_root: "/w".into(),
            webroot_file: "/w/index.php".into(),
            path: "/x/".into(),
            payload: "p".into(),
            total_iterations: iterations,
            payload_marker: "§ID§".into(),
            injectable: None,
            custom_config: None,
            one_param_per_payload: false,
        }
    }

    #[tokio::test]
    async fn test_failed_iterations_are_reported_not_fatal() {
        let harness = FlakyHarness { calls: AtomicU32::new(0) };
        let outcome = execute_all(&harness, &scenario(4)).await;
        assert_eq!(outcome.iterations.len(), 4);
        let (results, failed) = outcome.partition();
        assert_eq!(results.len(), 2);
        assert_eq!(failed, 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_parses_stdout() {
        let harness = SubprocessHarness::new(
            "sh",
            vec![
                "-c".into(),
                r#"cat >/dev/null; echo '{"first_http_line":null,"method":"GET","path":"/x/","headers":[],"output":"ok","PAYLOAD_GUIDs":["1"],"exec_time":0.1}'; echo warn >&2"#.into(),
            ],
            Duration::from_secs(5),
        );
        let run = harness.execute(&scenario(1).harness_config()).await.unwrap();
        assert_eq!(run.output.output, "ok");
        assert_eq!(run.stderr.trim(), "warn");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_garbage_is_output_error() {
        let harness = SubprocessHarness::new(
            "sh",
            vec!["-c".into(), "echo not-json".into()],
            Duration::from_secs(5),
        );
        let err = harness.execute(&scenario(1).harness_config()).await.unwrap_err();
        assert!(matches!(err, FuzzError::HarnessOutput(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_timeout() {
        let harness = SubprocessHarness::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            Duration::from_millis(200),
        );
        let err = harness.execute(&scenario(1).harness_config()).await.unwrap_err();
        assert!(matches!(err, FuzzError::Timeout(_)));
    }
}
