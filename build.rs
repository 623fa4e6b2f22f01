use std::time::{SystemTime, UNIX_EPOCH};

fn emit_build_version() {
    let n = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    println!("cargo:rustc-env=CONTIGUATOR_TOOLS_BUILD_N={n}");
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    emit_build_version();
}
