use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compress::CompressOpts;
use crate::ffmpeg::Ffmpeg;
use crate::frames::AssembleOpts;
use crate::{PrepError, DEFAULT_FRAMES_SUBDIR};

// A release job as read from `--config job.json`; every field is optional in the file.
//
// {
//   "input_root": "/data/blinkvision",
//   "groups": ["indoor_train", "outdoor_train"],
//   "previews": { "output_root": "vis", "compress": { "width": 640 } },
//   "export": { "keys": ["poses.npz", "metadata.json"] }
// }
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub input_root: PathBuf,
    // top level folders; aliases restart inside each of them
    pub groups: Vec<String>,
    pub ffmpeg: Option<PathBuf>,
    pub previews: PreviewConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub output_root: PathBuf,
    pub frames_subdir: String,
    pub preview_name: String,
    pub compressed_name: String,
    // the raw preview is only an intermediate unless asked to keep it
    pub keep_uncompressed: bool,
    pub assemble: AssembleOpts,
    pub compress: CompressOpts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_root: PathBuf,
    pub keys: Vec<String>,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("."),
            groups: vec![String::from("indoor_train"), String::from("outdoor_train")],
            ffmpeg: None,
            previews: PreviewConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("vis"),
            frames_subdir: String::from(DEFAULT_FRAMES_SUBDIR),
            preview_name: String::from("preview.mp4"),
            compressed_name: String::from("preview_compressed.mp4"),
            keep_uncompressed: false,
            assemble: AssembleOpts::default(),
            compress: CompressOpts::default(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("individual"),
            keys: vec![String::from("poses.npz"), String::from("metadata.json")],
        }
    }
}

impl PrepConfig {
    pub fn with_json_reader<R>(reader: R) -> Result<Self, PrepError>
    where
        R: Read,
    {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn with_json_file<AP>(file_name: AP) -> Result<Self, PrepError>
    where
        AP: AsRef<Path>,
    {
        let file_name = file_name.as_ref();
        let file = File::open(file_name).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PrepError::MissingInput(file_name.to_path_buf()),
            _ => PrepError::IoErr(e),
        })?;
        Self::with_json_reader(BufReader::new(file))
    }

    pub fn ffmpeg(&self) -> Ffmpeg {
        match self.ffmpeg {
            Some(ref program) => Ffmpeg::new(program),
            None => Ffmpeg::from_env(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = PrepConfig::with_json_reader("{}".as_bytes()).unwrap();
        assert_eq!(cfg.groups, vec!["indoor_train", "outdoor_train"]);
        assert_eq!(cfg.previews.frames_subdir, "clean_uint8");
        assert_eq!(cfg.previews.assemble.fps, 30.0);
        assert_eq!(cfg.previews.compress.width, 480);
        assert_eq!(cfg.previews.compress.crf, 28);
        assert!(!cfg.previews.keep_uncompressed);
        assert_eq!(cfg.export.keys, vec!["poses.npz", "metadata.json"]);
        assert_eq!(cfg.export.output_root, PathBuf::from("individual"));
    }

    #[test]
    fn partial_overrides() {
        let json = r#"{
            "input_root": "/data/blinkvision",
            "groups": ["outdoor_train"],
            "ffmpeg": "/opt/ffmpeg/bin/ffmpeg",
            "previews": { "compress": { "width": 640, "target_fps": 20 } },
            "export": { "keys": ["metadata.json"] }
        }"#;
        let cfg = PrepConfig::with_json_reader(json.as_bytes()).unwrap();
        assert_eq!(cfg.input_root, PathBuf::from("/data/blinkvision"));
        assert_eq!(cfg.groups, vec!["outdoor_train"]);
        assert_eq!(cfg.previews.compress.width, 640);
        assert_eq!(cfg.previews.compress.target_fps, Some(20.0));
        assert_eq!(cfg.previews.compress.crf, 28);
        assert_eq!(cfg.export.keys, vec!["metadata.json"]);
        assert_eq!(
            cfg.ffmpeg().program(),
            Path::new("/opt/ffmpeg/bin/ffmpeg")
        );
    }

    #[test]
    fn bad_json() {
        assert!(matches!(
            PrepConfig::with_json_reader(r#"{"groups": 3}"#.as_bytes()),
            Err(PrepError::JsonErr(_))
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            PrepConfig::with_json_file("/nonexistent/job.json"),
            Err(PrepError::MissingInput(_))
        ));
    }
}
