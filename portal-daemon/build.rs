use std::env;
use std::path::PathBuf;

// Copies the portal UI next to the binary so the `frontend_disk` build can
// serve it without embedding.
fn main() {
    println!("cargo:rerun-if-changed=../ui");

    let Ok(out_dir) = env::var("OUT_DIR") else {
        println!("cargo:warning=OUT_DIR not set, skipping UI copy");
        return;
    };
    // OUT_DIR 形如 .../target/release/build/portal-daemon-abc/out
    let target_dir = env::var("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(out_dir).join("../../../"));

    let src_ui_dir = PathBuf::from("../ui");
    let dest_ui_dir = target_dir.join("ui");

    if !src_ui_dir.exists() {
        println!("cargo:warning=UI source directory not found at {:?}", src_ui_dir);
        return;
    }

    let mut options = fs_extra::dir::CopyOptions::new();
    options.overwrite = true; // Overwrite old files
    options.content_only = true; // Only copy what's inside 'ui'

    if let Err(e) = std::fs::create_dir_all(&dest_ui_dir) {
        println!("cargo:warning=Failed to create {:?}: {}", dest_ui_dir, e);
        return;
    }
    if let Err(e) = fs_extra::dir::copy(&src_ui_dir, &dest_ui_dir, &options) {
        println!(
            "cargo:warning=Failed to copy UI assets from {:?} to {:?}: {}",
            src_ui_dir, dest_ui_dir, e
        );
    }
}
