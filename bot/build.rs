use std::path::{Path, PathBuf};
use std::process::Command;

/// Trimmed stdout of a git command, or "unknown"
fn git(workspace_root: &Path, args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .current_dir(workspace_root)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
    // bot/ lives directly under the workspace root
    let workspace_root = manifest_dir.parent().unwrap_or(&manifest_dir);

    let build_time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git(workspace_root, &["rev-parse", "HEAD"]));
    println!("cargo:rustc-env=GIT_BRANCH={}", git(workspace_root, &["rev-parse", "--abbrev-ref", "HEAD"]));
    println!("cargo:rustc-env=GIT_TAG={}", git(workspace_root, &["describe", "--tags", "--abbrev=0"]));
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
