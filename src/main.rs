// src/main.rs
use clap::Parser;
use controlplane_pki::{app, types::Args};
use std::io;

fn main() -> io::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if let Err(e) = app::run_app(&args) {
        eprintln!("Error: {}", e);
        return Err(e);
    }
    Ok(())
}
