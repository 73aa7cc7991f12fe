use tokio::process::Command;
use crate::errors::FuzzError;

/// Snapshot of the process table as printed by `ps -ef`.
pub async fn capture_process_list() -> Result<String, FuzzError> {
    let output = Command::new("ps")
        .arg("-ef")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| FuzzError::Scanner(format!("Failed to run ps: {}", e)))?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
