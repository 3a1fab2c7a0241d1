use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::err::HubError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    #[default]
    Dataset,
    Model,
    Space,
}

impl RepoType {
    // api/{plural}/...
    pub fn plural(&self) -> &'static str {
        match self {
            RepoType::Dataset => "datasets",
            RepoType::Model => "models",
            RepoType::Space => "spaces",
        }
    }

    // git remotes of models live at the root
    pub fn git_prefix(&self) -> &'static str {
        match self {
            RepoType::Dataset => "datasets/",
            RepoType::Model => "",
            RepoType::Space => "spaces/",
        }
    }
}

impl FromStr for RepoType {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, HubError> {
        match s {
            "dataset" | "datasets" => Ok(RepoType::Dataset),
            "model" | "models" => Ok(RepoType::Model),
            "space" | "spaces" => Ok(RepoType::Space),
            other => Err(HubError::InvalidRepoType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub repo_id: String,
    pub repo_type: RepoType,
    pub revision: String,
}

impl RepoRef {
    pub fn new<S1, S2>(repo_id: S1, repo_type: RepoType, revision: S2) -> Result<Self, HubError>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let repo_id = repo_id.into();
        let valid = match repo_id.split_once('/') {
            Some((ns, name)) => {
                let ok = |part: &str| {
                    !part.is_empty()
                        && part
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c))
                };
                ok(ns) && ok(name)
            }
            None => false,
        };
        if !valid {
            return Err(HubError::InvalidRepoId(repo_id));
        }
        Ok(Self {
            repo_id,
            repo_type,
            revision: revision.into(),
        })
    }

    pub fn dataset<S>(repo_id: S) -> Result<Self, HubError>
    where
        S: Into<String>,
    {
        Self::new(repo_id, RepoType::Dataset, "main")
    }

    // api/datasets/org/name/<action>/<revision>, relative to the endpoint
    pub fn api_path(&self, action: &str) -> String {
        format!(
            "api/{}/{}/{}/{}",
            self.repo_type.plural(),
            self.repo_id,
            action,
            self.revision.replace('/', "%2F")
        )
    }

    pub fn lfs_batch_path(&self) -> String {
        format!(
            "{}{}.git/info/lfs/objects/batch",
            self.repo_type.git_prefix(),
            self.repo_id
        )
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.repo_type.git_prefix(), self.repo_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhoAmI {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreuploadFile {
    pub path: String,
    // base64 of the leading bytes
    pub sample: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct PreuploadRequest<'a> {
    pub files: &'a [PreuploadFile],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    Regular,
    Lfs,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreuploadResponseFile {
    pub path: String,
    pub upload_mode: UploadMode,
    #[serde(default)]
    pub should_ignore: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreuploadResponse {
    pub files: Vec<PreuploadResponseFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfsObject {
    pub oid: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct LfsBatchRequest<'a> {
    pub operation: &'static str,
    pub transfers: &'static [&'static str],
    pub objects: &'a [LfsObject],
    pub hash_algo: &'static str,
}

impl<'a> LfsBatchRequest<'a> {
    pub fn upload(objects: &'a [LfsObject]) -> Self {
        Self {
            operation: "upload",
            transfers: &["basic"],
            objects,
            hash_algo: "sha256",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LfsAction {
    pub href: String,
    #[serde(default)]
    pub header: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LfsActions {
    #[serde(default)]
    pub upload: Option<LfsAction>,
    #[serde(default)]
    pub verify: Option<LfsAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LfsObjectError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LfsBatchObject {
    pub oid: String,
    pub size: u64,
    // absent when the hub already stores the object
    #[serde(default)]
    pub actions: Option<LfsActions>,
    #[serde(default)]
    pub error: Option<LfsObjectError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LfsBatchResponse {
    #[serde(default)]
    pub transfer: Option<String>,
    pub objects: Vec<LfsBatchObject>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOp {
    // small files travel inline, base64 encoded
    File { path: String, content_b64: String },
    // already pushed to LFS storage; the commit only references it
    LfsFile { path: String, oid: String, size: u64 },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    #[serde(default)]
    pub commit_url: Option<String>,
    #[serde(default)]
    pub commit_oid: Option<String>,
}

/// Commit payload: one JSON document per line, header first.
pub fn commit_ndjson(summary: &str, description: &str, ops: &[CommitOp]) -> Result<String, HubError> {
    let mut lines = Vec::with_capacity(ops.len() + 1);
    lines.push(serde_json::to_string(&json!({
        "key": "header",
        "value": { "summary": summary, "description": description },
    }))?);
    for op in ops {
        let line = match op {
            CommitOp::File { path, content_b64 } => json!({
                "key": "file",
                "value": { "content": content_b64, "path": path, "encoding": "base64" },
            }),
            CommitOp::LfsFile { path, oid, size } => json!({
                "key": "lfsFile",
                "value": { "path": path, "algo": "sha256", "oid": oid, "size": size },
            }),
        };
        lines.push(serde_json::to_string(&line)?);
    }
    Ok(lines.join("\n"))
}
