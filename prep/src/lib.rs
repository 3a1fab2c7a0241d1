use std::path::PathBuf;

use thiserror::Error;

use crate::data::Dim;

pub mod alias;
pub mod archive;
pub mod batch;
pub mod compress;
pub mod config;
pub mod data;
pub mod ffmpeg;
pub mod frames;
pub mod layout;
pub mod log;

// Frame rate used when the preview assembly isn't told otherwise
pub const DEFAULT_FPS: f64 = 30.0;

// Sub-directory of every sample folder holding the rendered frames
pub const DEFAULT_FRAMES_SUBDIR: &str = "clean_uint8";

// One erring to rule them all...
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Sequence position {position} outside of supported domain 1..={max}")]
    Domain { position: i64, max: i64 },
    #[error("Non UTF-8 file name {0:?}")]
    NonUtf8Name(PathBuf),
    #[error("Missing input {0:?}")]
    MissingInput(PathBuf),
    #[error("Expected output {0:?} was not produced")]
    MissingOutput(PathBuf),
    #[error("No frames found in {0:?}")]
    EmptyFrameSequence(PathBuf),
    #[error("Frame {path:?} is {found:?}, expected {expected:?}")]
    FrameSizeMismatch {
        path: PathBuf,
        expected: Dim,
        found: Dim,
    },
    #[error("Unsupported too big Frame Dimensions {width} {height}")]
    UnsupportedFrameDimensionsTooBig { width: u32, height: u32 },
    #[error("Unsupported too small Frame Dimensions {width} {height}")]
    UnsupportedFrameDimensionsTooSmall { width: u32, height: u32 },
    #[error("{tool} exited with {status}: {stderr}")]
    ExternalTool {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("Unexpected IO error: {0}")]
    IoErr(#[from] std::io::Error),
    #[error("Unexpected Json error: {0}")]
    JsonErr(#[from] serde_json::Error),
    #[error("Image decode error: {0}")]
    ImageErr(#[from] image::ImageError),
    #[error("Zip archive error: {0}")]
    ZipErr(#[from] zip::result::ZipError),
    #[error("Directory walk error: {0}")]
    WalkErr(#[from] walkdir::Error),
}
