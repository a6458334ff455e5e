use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors surfaced by the driver. The filter kernel itself cannot
/// fail; anything here aborts the run with exit code 1.
#[derive(Debug, Error)]
pub enum DenoiseError {
    #[error("failed to read EXR '{path}': {source}")]
    Exr {
        path: PathBuf,
        source: exr::error::Error,
    },

    #[error("channel {name} in '{path}' is not single-precision float")]
    ChannelType { name: String, path: PathBuf },

    #[error("no usable float channels in '{path}'")]
    NoChannels { path: PathBuf },

    #[error("channel {name} not found")]
    ChannelMissing { name: String },

    #[error("out of premapped filter memory: {requested} bytes requested, {remaining} remaining")]
    ArenaExhausted { requested: usize, remaining: usize },

    #[error("failed to map filter memory: {0}")]
    ArenaMap(#[source] std::io::Error),

    #[error("failed to create output directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write image '{path}': {source}")]
    ImageWrite {
        path: PathBuf,
        source: image::ImageError,
    },
}
