//! Build script for uel
//!
//! Embeds version and target information into the CLI binary.

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=src/main.rs");
    println!("cargo:rerun-if-changed=build.rs");

    if let Ok(version) = env::var("CARGO_PKG_VERSION") {
        println!("cargo:rustc-env=UEL_VERSION={}", version);
    }

    if let Ok(target) = env::var("TARGET") {
        println!("cargo:rustc-env=UEL_TARGET={}", target);
    }

    // Reported by `uel --info`
    let profile = env::var("PROFILE").unwrap_or_default();
    println!("cargo:rustc-env=UEL_PROFILE={}", profile);
}
