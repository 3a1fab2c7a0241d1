use std::path::PathBuf;

use thiserror::Error;
use vidset_prep::PrepError;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Invalid repo id {0:?}, expected namespace/name")]
    InvalidRepoId(String),
    #[error("Unknown repo type {0:?}, expected dataset, model or space")]
    InvalidRepoType(String),
    #[error("No token given; pass --token or set HF_TOKEN")]
    MissingToken,
    #[error("{status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    #[error("LFS transfer failed for {oid}: {reason}")]
    Lfs { oid: String, reason: String },
    #[error("Missing source {0:?}")]
    MissingSource(PathBuf),
    #[error("Non UTF-8 path {0:?}")]
    NonUtf8Path(PathBuf),
    #[error("Http error: {0}")]
    HttpErr(#[from] reqwest::Error),
    #[error("Invalid url: {0}")]
    UrlErr(#[from] url::ParseError),
    #[error("Unexpected IO error: {0}")]
    IoErr(#[from] std::io::Error),
    #[error("Unexpected Json error: {0}")]
    JsonErr(#[from] serde_json::Error),
    #[error("Directory walk error: {0}")]
    WalkErr(#[from] walkdir::Error),
    #[error("Background task failed: {0}")]
    TaskErr(#[from] tokio::task::JoinError),
    #[error(transparent)]
    PrepErr(#[from] PrepError),
}
