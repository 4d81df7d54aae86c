//! Command line and the validated runtime parameters built from it.

use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::core::decode::Codec;
use crate::core::library::{Binding, default_bindings};

/// Extension every transcoded file is exposed under.
pub const TARGET_EXTENSION: &str = "wav";
pub const DEFAULT_STAT_CACHE_SIZE: usize = 500;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("invalid source binding {0:?}, expected EXT=CODEC")]
    BadBinding(String),

    #[error("unknown codec {0:?} (known: flac, vorbis)")]
    UnknownCodec(String),

    #[error("source extension {0:?} declared twice")]
    DuplicateExtension(String),

    #[error("source extension {0:?} is also the target extension")]
    TargetIsSource(String),
}

#[derive(Parser, Debug)]
#[command(
    name = "wavfs",
    version,
    about = "Expose FLAC and Ogg Vorbis files as WAV files, transcoded on read"
)]
pub struct Args {
    /// Directory holding the source files.
    pub basepath: PathBuf,

    /// Empty directory to mount on.
    pub mountpoint: PathBuf,

    /// Source extension and the codec that decodes it. Repeatable; order
    /// decides which file backs a name when several exist.
    #[arg(long = "source", value_name = "EXT=CODEC", value_parser = parse_binding)]
    pub sources: Vec<Binding>,

    /// Number of encoded sizes remembered between getattr calls (0 disables).
    #[arg(long, default_value_t = DEFAULT_STAT_CACHE_SIZE)]
    pub stat_cache_size: usize,

    /// Default log filter; RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Shorthand for --log-level debug.
    #[arg(short, long)]
    pub debug: bool,

    /// Let other users access the mount.
    #[arg(long)]
    pub allow_other: bool,

    /// Mount through the kernel directly instead of fusermount3.
    #[arg(long)]
    pub privileged: bool,
}

/// Immutable after startup.
#[derive(Debug, Clone)]
pub struct Params {
    pub basepath: PathBuf,
    pub target_ext: String,
    pub bindings: Vec<Binding>,
    pub stat_cache_size: usize,
}

impl Params {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let bindings = if args.sources.is_empty() {
            default_bindings()
        } else {
            args.sources.clone()
        };
        let params = Self {
            basepath: args.basepath.clone(),
            target_ext: TARGET_EXTENSION.to_string(),
            bindings,
            stat_cache_size: args.stat_cache_size,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.basepath.is_dir() {
            return Err(ConfigError::NotADirectory(self.basepath.clone()));
        }
        let mut seen = HashSet::new();
        for b in &self.bindings {
            if b.extension == self.target_ext {
                return Err(ConfigError::TargetIsSource(b.extension.clone()));
            }
            if !seen.insert(b.extension.as_str()) {
                return Err(ConfigError::DuplicateExtension(b.extension.clone()));
            }
        }
        Ok(())
    }
}

fn parse_binding(s: &str) -> Result<Binding, ConfigError> {
    let (ext, codec) = s
        .split_once('=')
        .ok_or_else(|| ConfigError::BadBinding(s.to_string()))?;
    let ext = ext.trim().trim_start_matches('.');
    if ext.is_empty() || ext.contains('/') {
        return Err(ConfigError::BadBinding(s.to_string()));
    }
    let codec = Codec::from_name(codec.trim())
        .ok_or_else(|| ConfigError::UnknownCodec(codec.trim().to_string()))?;
    Ok(Binding::new(ext, codec))
}
