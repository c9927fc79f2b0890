//! Build script for sane-sys.
//!
//! The SANE ABI is frozen at version 1, so the declarations in `src/lib.rs`
//! are written by hand and only linking is resolved here.

fn main() {
    println!("cargo:rerun-if-env-changed=SANE_LIB_DIR");

    if let Ok(lib_dir) = std::env::var("SANE_LIB_DIR") {
        println!("cargo:rustc-link-search=native={lib_dir}");
        println!("cargo:rustc-link-lib=sane");
        return;
    }

    // Try pkg-config first
    if pkg_config::probe_library("sane-backends").is_ok() {
        return;
    }

    // Fallback to standard locations
    println!("cargo:rustc-link-lib=sane");

    let lib_paths = ["/usr/local/lib", "/usr/lib", "/usr/lib/x86_64-linux-gnu"];

    for path in lib_paths {
        if std::path::Path::new(path).join("libsane.so").exists() {
            println!("cargo:rustc-link-search=native={path}");
            break;
        }
    }
}
