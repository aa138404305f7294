//! Deepfake detection CLI entry point
//!
//! Thin wrapper around the library's CLI module; the analysis pipeline
//! itself lives in the authlens library.

#[cfg(feature = "cli")]
use authlens::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> authlens::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
