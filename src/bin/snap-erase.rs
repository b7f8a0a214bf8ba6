//! Snap Erase CLI Tool
//!
//! Removes the background of a photograph with a U2-Net style segmentation model.

#[cfg(feature = "cli")]
use snap_erase::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
