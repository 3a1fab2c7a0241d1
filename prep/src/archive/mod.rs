use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::PrepError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExportOutcome {
    Zipped { archive: PathBuf, files: usize },
    Copied { path: PathBuf },
    Missing { key: String },
}

// Archive names always use '/', whatever the host separator is
fn archive_name(base: &Path, path: &Path) -> Result<String, PrepError> {
    let rel = path
        .strip_prefix(base)
        .map_err(|_| PrepError::InvalidArgument(format!("{path:?} is not under {base:?}")))?;
    let parts = rel
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .ok_or_else(|| PrepError::NonUtf8Name(path.to_path_buf()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("/"))
}

// Write `entries` (source file, name inside the archive) into a deflated zip at `archive`.
pub fn write_zip<AP>(archive: AP, entries: &[(PathBuf, String)]) -> Result<(), PrepError>
where
    AP: AsRef<Path>,
{
    let out = BufWriter::new(File::create(archive.as_ref())?);
    let mut zip = ZipWriter::new(out);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(false);
    for (src, name) in entries {
        let mut file = File::open(src)?;
        let large = file.metadata()?.len() >= u32::MAX as u64;
        zip.start_file(name.as_str(), options.large_file(large))?;
        std::io::copy(&mut file, &mut zip)?;
    }
    let mut out = zip.finish()?;
    out.flush()?;
    Ok(())
}

// Every file below `dir`, named relative to `base`, in a stable walk order
fn zip_entries(base: &Path, dir: &Path) -> Result<Vec<(PathBuf, String)>, PrepError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            let name = archive_name(base, entry.path())?;
            entries.push((entry.into_path(), name));
        }
    }
    Ok(entries)
}

// Export the selected `keys` of one sample folder.
//
// Directories become `<key>.zip` (names relative to `input_dir`, so the key stays the top
// level folder inside the archive); plain files are copied as-is and any stale `<key>.zip`
// next to them is removed. Missing keys are reported, not fatal.
pub fn export_selected<AP1, AP2, S>(
    input_dir: AP1,
    output_dir: AP2,
    keys: &[S],
) -> Result<Vec<ExportOutcome>, PrepError>
where
    AP1: AsRef<Path>,
    AP2: AsRef<Path>,
    S: AsRef<str>,
{
    let (input_dir, output_dir) = (input_dir.as_ref(), output_dir.as_ref());
    std::fs::create_dir_all(output_dir)?;

    let mut outcomes = Vec::with_capacity(keys.len());
    for key in keys {
        let key = key.as_ref();
        let key_path = input_dir.join(key);
        let zip_path = output_dir.join(format!("{key}.zip"));

        if !key_path.exists() {
            tracing::warn!("{key} not found in {input_dir:?}");
            outcomes.push(ExportOutcome::Missing {
                key: key.to_string(),
            });
            continue;
        }

        if !key_path.is_dir() {
            let save_path = output_dir.join(key);
            std::fs::copy(&key_path, &save_path)?;
            if zip_path.exists() {
                std::fs::remove_file(&zip_path)?;
            }
            tracing::info!("Copy file: {save_path:?}");
            outcomes.push(ExportOutcome::Copied { path: save_path });
            continue;
        }

        let entries = zip_entries(input_dir, &key_path)?;
        write_zip(&zip_path, &entries)?;
        tracing::info!("Created zip file: {zip_path:?}");
        outcomes.push(ExportOutcome::Zipped {
            archive: zip_path,
            files: entries.len(),
        });
    }
    Ok(outcomes)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;
    use zip::ZipArchive;

    fn names_in(archive: &Path) -> Vec<String> {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn directory_keys_are_zipped_relative_to_the_sample() {
        let temp = tempdir().unwrap();
        let sample = temp.path().join("indoor_train").join("scene_007");
        std::fs::create_dir_all(sample.join("depth").join("nested")).unwrap();
        std::fs::write(sample.join("depth").join("0001.npy"), b"one").unwrap();
        std::fs::write(sample.join("depth").join("nested").join("0000.npy"), b"zero").unwrap();
        std::fs::write(sample.join("depth").join("0000.npy"), b"first").unwrap();

        let out = temp.path().join("individual").join("indoor_train").join("aa");
        let outcomes = export_selected(&sample, &out, &["depth"]).unwrap();

        let archive = out.join("depth.zip");
        assert_eq!(
            outcomes,
            vec![ExportOutcome::Zipped {
                archive: archive.clone(),
                files: 3
            }]
        );
        assert_eq!(
            names_in(&archive),
            vec!["depth/0000.npy", "depth/0001.npy", "depth/nested/0000.npy"]
        );

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut body = String::new();
        zip.by_name("depth/nested/0000.npy")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "zero");
    }

    #[test]
    fn file_keys_are_copied_and_stale_zips_dropped() {
        let temp = tempdir().unwrap();
        let sample = temp.path().join("sample");
        std::fs::create_dir_all(&sample).unwrap();
        std::fs::write(sample.join("metadata.json"), br#"{"fps": 30}"#).unwrap();

        let out = temp.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("metadata.json.zip"), b"stale").unwrap();

        let outcomes =
            export_selected(&sample, &out, &["metadata.json", "poses.npz"]).unwrap();
        assert_eq!(
            outcomes,
            vec![
                ExportOutcome::Copied {
                    path: out.join("metadata.json")
                },
                ExportOutcome::Missing {
                    key: String::from("poses.npz")
                },
            ]
        );
        assert_eq!(
            std::fs::read(out.join("metadata.json")).unwrap(),
            br#"{"fps": 30}"#
        );
        assert!(!out.join("metadata.json.zip").exists());
    }

    #[test]
    fn explicit_entries() {
        let temp = tempdir().unwrap();
        let a = temp.path().join("a.txt");
        std::fs::write(&a, b"alpha").unwrap();
        let archive = temp.path().join("bundle.zip");
        write_zip(&archive, &[(a.clone(), String::from("docs/a.txt"))]).unwrap();
        assert_eq!(names_in(&archive), vec!["docs/a.txt"]);
    }
}
