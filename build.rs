//! Build script - copies the linker script into the output directory
//! so that the linker can find it at link time.
//!
//! Host builds (library + tests) do not link against `memory.x`, so the
//! copy only happens when the `embedded` feature is enabled.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if env::var_os("CARGO_FEATURE_EMBEDDED").is_none() {
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    // Copy memory.x to OUT_DIR
    fs::copy("memory.x", out_dir.join("memory.x")).expect("memory.x is present in the crate root");

    // Tell cargo to look for linker scripts in OUT_DIR
    println!("cargo:rustc-link-search={}", out_dir.display());

    // Rebuild if the linker script changes
    println!("cargo:rerun-if-changed=memory.x");
}
