// Build script to inject the version string from git tags
//
// Produces COLDSPOTS_VERSION:
// - "0.2.0" on a clean `v0.2.0` tag
// - "0.2.0" for commits after a tag (`v0.2.0-3-gabc123`)
// - "<pkg version>-<describe>" when no tag is reachable
// Falls back to CARGO_PKG_VERSION when git is unavailable.

use std::process::Command;

fn main() {
    let version = git_version().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=COLDSPOTS_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
    println!("cargo:rerun-if-changed=.git/refs/tags");
}

fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();
    if described.is_empty() {
        return None;
    }

    match described.strip_prefix('v') {
        Some(tagged) => {
            let release = tagged.split('-').next().unwrap_or(tagged);
            Some(release.to_string())
        }
        None => {
            let base = env!("CARGO_PKG_VERSION");
            Some(format!("{}-{}", base, described))
        }
    }
}
