use std::process::Command;

fn main() {
    // Short commit hash for `hukum --version`; HUKUM_GIT_HASH covers builds
    // outside a checkout.
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            std::env::var("HUKUM_GIT_HASH")
                .ok()
                .filter(|s| s != "unknown" && !s.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rerun-if-env-changed=HUKUM_GIT_HASH");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
