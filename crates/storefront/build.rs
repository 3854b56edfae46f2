//! Build script for the storefront crate.
//!
//! Fingerprints the stylesheet so templates can append a cache-busting
//! `?v=` query to its URL.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") else {
        println!("cargo:rustc-env=ASSET_VERSION=dev");
        return;
    };
    let css_path = Path::new(&manifest_dir).join("static/css/main.css");
    println!("cargo:rerun-if-changed={}", css_path.display());

    let version = match fs::read(&css_path) {
        Ok(content) => {
            let digest = Sha256::digest(&content);
            digest.iter().take(4).fold(String::new(), |mut out, b| {
                let _ = write!(out, "{b:02x}");
                out
            })
        }
        Err(e) => {
            println!("cargo:warning=Could not read main.css: {e}");
            "dev".to_owned()
        }
    };

    println!("cargo:rustc-env=ASSET_VERSION={version}");
}
