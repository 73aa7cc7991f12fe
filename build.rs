use std::process::Command;

fn git_hash() -> Option<String> {
    let output = Command::new("git").args(["rev-parse", "--short", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let built = chrono::Utc::now();
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", built.to_rfc3339());

    let hash = git_hash();
    if let Some(hash) = &hash {
        println!("cargo:rustc-env=GIT_HASH={hash}");
    }

    // Shown by `payloadscope --version`.
    println!(
        "cargo:rustc-env=PAYLOADSCOPE_LONG_VERSION={} ({} {})",
        std::env::var("CARGO_PKG_VERSION").unwrap_or_default(),
        hash.as_deref().unwrap_or("unknown"),
        built.format("%Y-%m-%d"),
    );
}
