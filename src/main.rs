//! wavfs
//!
//! Mirrors a music directory through FUSE, read-only. Every FLAC or Ogg
//! Vorbis file shows up as a `.wav` of the same name; reading it decodes the
//! source on demand and serves 16-bit PCM with the source tags carried in an
//! ID3v2.4 chunk. Everything else passes through untouched.
//!
//! # Layout
//! - `core::decode`: symphonia-backed decoders, one per source codec.
//! - `core::tags`: tag vocabulary and the ID3 writer fed by the decoders.
//! - `core::encode`: the WAV encoder.
//! - `core::transcode`: drives decoder -> encoder into an in-memory buffer.
//! - `core::library`: virtual <-> real path mapping.
//! - `fs`: the path-based shim, its FUSE adapter and mount helpers.

mod config;
mod core;
mod fs;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use crate::config::{Args, Params};
use crate::fs::fuse::WavFs;
use crate::fs::{FilesystemShim, TranscoderFactory};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args.log_level, args.debug);

    let params = match Params::from_args(&args) {
        Ok(params) => params,
        Err(e) => {
            error!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shim = FilesystemShim::new(&params, Box::new(TranscoderFactory));
    let sources: Vec<String> = params
        .bindings
        .iter()
        .map(|b| format!("{}={}", b.extension, b.codec.name()))
        .collect();
    info!(
        basepath = %shim.resolver().basepath().display(),
        mountpoint = %args.mountpoint.display(),
        target = shim.resolver().target_ext(),
        ?sources,
        "mounting"
    );

    let wavfs = WavFs::new(Arc::new(shim));
    let handle = match fs::mount::mount(wavfs, &args.mountpoint, args.allow_other, args.privileged).await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!(mountpoint = %args.mountpoint.display(), "mount failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!("mounted; press Ctrl-C to unmount");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("cannot listen for Ctrl-C: {e}");
    }

    info!("unmounting");
    if let Err(e) = handle.unmount().await {
        error!("unmount failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
