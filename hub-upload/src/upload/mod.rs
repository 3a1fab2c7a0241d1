use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use vidset_prep::batch::BatchReport;
use walkdir::WalkDir;

use crate::client::HubClient;
use crate::err::HubError;
use crate::wire::{CommitOp, CommitResponse, LfsObject, PreuploadFile, RepoRef, UploadMode};
use crate::{LFS_BATCH_CHUNK, SAMPLE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Dir,
}

// One child of the folder being uploaded; each gets its own commit
#[derive(Debug, Clone)]
pub struct TopLevelItem {
    pub rel: String,
    pub abs: PathBuf,
    pub kind: ItemKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub abs: PathBuf,
    pub path_in_repo: String,
    pub size: u64,
}

// A local file with what the hub needs to route it
#[derive(Debug, Clone)]
struct Prepared {
    file: LocalFile,
    sample: String,
    oid: String,
}

// Immediate children of `local_path`, sorted by name. A child whose name can't
// become a repo path is failed in the report and the rest are still listed.
pub fn list_top_level<AP>(local_path: AP) -> Result<(Vec<TopLevelItem>, BatchReport), HubError>
where
    AP: AsRef<Path>,
{
    let local_path = local_path.as_ref();
    if !local_path.is_dir() {
        return Err(HubError::MissingSource(local_path.to_path_buf()));
    }
    let mut report = BatchReport::default();
    let mut items = Vec::new();
    for entry in std::fs::read_dir(local_path)? {
        let abs = entry?.path();
        let rel = match abs.file_name().and_then(|name| name.to_str()) {
            Some(rel) => rel.to_string(),
            None => {
                let item = abs.to_string_lossy().to_string();
                report.fail(item, &HubError::NonUtf8Path(abs));
                continue;
            }
        };
        let kind = if abs.is_dir() {
            ItemKind::Dir
        } else {
            ItemKind::File
        };
        items.push(TopLevelItem { rel, abs, kind });
    }
    items.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok((items, report))
}

// "" and "." both mean the repo root
pub fn repo_path(remote: &str, rel: &str) -> String {
    let remote = remote.trim_matches('/');
    if remote.is_empty() || remote == "." {
        rel.to_string()
    } else {
        format!("{remote}/{rel}")
    }
}

// Every file an item contributes, with its destination inside the repo.
pub fn collect_files(item: &TopLevelItem, remote_path: &str) -> Result<Vec<LocalFile>, HubError> {
    let base = repo_path(remote_path, &item.rel);
    if item.kind == ItemKind::File {
        let size = std::fs::metadata(&item.abs)?.len();
        return Ok(vec![LocalFile {
            abs: item.abs.clone(),
            path_in_repo: base,
            size,
        }]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&item.abs).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(&item.abs) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let mut parts = Vec::new();
        for part in rel.components() {
            let part = part
                .as_os_str()
                .to_str()
                .ok_or_else(|| HubError::NonUtf8Path(entry.path().to_path_buf()))?;
            parts.push(part);
        }
        files.push(LocalFile {
            abs: entry.path().to_path_buf(),
            path_in_repo: format!("{base}/{}", parts.join("/")),
            size: entry.metadata()?.len(),
        });
    }
    Ok(files)
}

// sha256 of the whole file plus a base64 copy of its head
fn prepare(file: LocalFile) -> Result<Prepared, HubError> {
    let mut reader = File::open(&file.abs)?;
    let mut hasher = Sha256::new();
    let mut head = Vec::with_capacity(SAMPLE_SIZE);
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        if head.len() < SAMPLE_SIZE {
            let take = n.min(SAMPLE_SIZE - head.len());
            head.extend_from_slice(&buf[..take]);
        }
        hasher.update(&buf[..n]);
    }
    Ok(Prepared {
        file,
        sample: STANDARD.encode(&head),
        oid: format!("{:x}", hasher.finalize()),
    })
}

fn prepare_item(item: TopLevelItem, remote_path: String) -> Result<Vec<Prepared>, HubError> {
    collect_files(&item, &remote_path)?
        .into_iter()
        .map(prepare)
        .collect()
}

// Push one top level item as a single commit. `None` when it holds no files.
pub async fn upload_item(
    client: &HubClient,
    repo: &RepoRef,
    item: &TopLevelItem,
    remote_path: &str,
) -> Result<Option<CommitResponse>, HubError> {
    let prepared = {
        let item = item.clone();
        let remote_path = remote_path.to_string();
        tokio::task::spawn_blocking(move || prepare_item(item, remote_path)).await??
    };
    if prepared.is_empty() {
        return Ok(None);
    }

    let requests: Vec<PreuploadFile> = prepared
        .iter()
        .map(|p| PreuploadFile {
            path: p.file.path_in_repo.clone(),
            sample: p.sample.clone(),
            size: p.file.size,
        })
        .collect();
    let modes: HashMap<String, (UploadMode, bool)> = client
        .preupload(repo, &requests)
        .await?
        .into_iter()
        .map(|f| (f.path, (f.upload_mode, f.should_ignore)))
        .collect();

    let mut regular = Vec::new();
    let mut lfs = Vec::new();
    for p in prepared.iter() {
        match modes.get(&p.file.path_in_repo) {
            Some((_, true)) => {
                tracing::debug!("hub ignores {}", p.file.path_in_repo);
            }
            Some((UploadMode::Lfs, false)) => lfs.push(p),
            // unknown paths are sent inline
            Some((UploadMode::Regular, false)) | None => regular.push(p),
        }
    }

    if !lfs.is_empty() {
        push_lfs(client, repo, &lfs).await?;
    }

    let mut ops = Vec::with_capacity(regular.len() + lfs.len());
    for p in regular {
        let content = tokio::fs::read(&p.file.abs).await?;
        ops.push(CommitOp::File {
            path: p.file.path_in_repo.clone(),
            content_b64: STANDARD.encode(content),
        });
    }
    for p in lfs {
        ops.push(CommitOp::LfsFile {
            path: p.file.path_in_repo.clone(),
            oid: p.oid.clone(),
            size: p.file.size,
        });
    }
    if ops.is_empty() {
        return Ok(None);
    }

    let summary = format!("Upload {}", item.rel);
    Ok(Some(client.commit(repo, &summary, &ops).await?))
}

async fn push_lfs(client: &HubClient, repo: &RepoRef, files: &[&Prepared]) -> Result<(), HubError> {
    let mut by_oid: HashMap<&str, &Prepared> = HashMap::new();
    for p in files.iter() {
        by_oid.entry(p.oid.as_str()).or_insert(*p);
    }
    let mut objects: Vec<LfsObject> = by_oid
        .values()
        .map(|p| LfsObject {
            oid: p.oid.clone(),
            size: p.file.size,
        })
        .collect();
    objects.sort_by(|a, b| a.oid.cmp(&b.oid));

    for chunk in objects.chunks(LFS_BATCH_CHUNK) {
        push_lfs_batch(client, repo, chunk, &by_oid).await?;
    }
    Ok(())
}

async fn push_lfs_batch(
    client: &HubClient,
    repo: &RepoRef,
    objects: &[LfsObject],
    by_oid: &HashMap<&str, &Prepared>,
) -> Result<(), HubError> {
    let batch = client.lfs_batch(repo, objects).await?;
    for object in batch.objects.iter() {
        if let Some(ref err) = object.error {
            return Err(HubError::Lfs {
                oid: object.oid.clone(),
                reason: format!("{} ({})", err.message, err.code),
            });
        }
        let actions = match object.actions {
            Some(ref actions) => actions,
            None => {
                tracing::debug!("{} already stored", object.oid);
                continue;
            }
        };
        let local = by_oid
            .get(object.oid.as_str())
            .ok_or_else(|| HubError::Lfs {
                oid: object.oid.clone(),
                reason: String::from("hub answered for an object that was not requested"),
            })?;
        let lfs_object = LfsObject {
            oid: object.oid.clone(),
            size: object.size,
        };
        if let Some(ref upload) = actions.upload {
            tracing::debug!("uploading {} ({} bytes)", local.file.path_in_repo, object.size);
            client.lfs_upload(upload, &lfs_object, &local.file.abs).await?;
        }
        if let Some(ref verify) = actions.verify {
            client.lfs_verify(verify, &lfs_object).await?;
        }
    }
    Ok(())
}

// Upload every top level item of `local_path` with its own commit.
//
// A failing item is logged and recorded; the remaining items still go up.
// With `dry_run` nothing is sent and the planned repo paths are only logged.
pub async fn upload_tree<AP>(
    client: &HubClient,
    repo: &RepoRef,
    local_path: AP,
    remote_path: &str,
    dry_run: bool,
) -> Result<BatchReport, HubError>
where
    AP: AsRef<Path>,
{
    let (items, mut report) = list_top_level(local_path)?;
    for item in items {
        if dry_run {
            match collect_files(&item, remote_path) {
                Ok(files) if files.is_empty() => report.skip(item.rel, "nothing to upload"),
                Ok(files) => {
                    for f in files.iter() {
                        tracing::info!("{:?} -> {}:{} ({} bytes)", f.abs, repo, f.path_in_repo, f.size);
                    }
                    report.success(item.rel);
                }
                Err(e) => report.fail(item.rel, &e),
            }
            continue;
        }

        match upload_item(client, repo, &item, remote_path).await {
            Ok(Some(commit)) => {
                tracing::info!("Successfully uploaded {} to {}", item.rel, repo.repo_id);
                if let Some(url) = commit.commit_url {
                    tracing::debug!("commit {url}");
                }
                report.success(item.rel);
            }
            Ok(None) => report.skip(item.rel, "nothing to upload"),
            Err(e) => {
                let label = format!("Error uploading {} to {}", item.rel, repo.repo_id);
                report.fail(item.rel, &format!("{label}: {e}"));
            }
        }
    }
    report.log_summary("upload");
    Ok(report)
}
