use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ffmpeg::Ffmpeg;
use crate::{PrepError, DEFAULT_FPS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressOpts {
    // target width in pixels; height follows the aspect ratio (kept even)
    pub width: u32,
    // 23 is the x264 default, higher = more compression
    pub crf: u8,
    pub preset: String,
    pub codec: String,
    // frame rate the source was rendered at
    pub source_fps: f64,
    // retime to this rate keeping every frame, so the duration stretches or shrinks
    pub target_fps: Option<f64>,
    // seconds
    pub start: Option<f64>,
    pub duration: Option<f64>,
    // delete the input once the output is verified
    pub remove_source: bool,
}

impl Default for CompressOpts {
    fn default() -> Self {
        Self {
            width: 480,
            crf: 28,
            preset: String::from("medium"),
            codec: String::from("libx264"),
            source_fps: DEFAULT_FPS,
            target_fps: None,
            start: None,
            duration: None,
            remove_source: false,
        }
    }
}

impl CompressOpts {
    pub fn validate(&self) -> Result<(), PrepError> {
        if self.width < 2 {
            return Err(PrepError::InvalidArgument(format!(
                "width must be at least 2, got {}",
                self.width
            )));
        }
        if self.crf > 51 {
            return Err(PrepError::InvalidArgument(format!(
                "crf must be within 0..=51, got {}",
                self.crf
            )));
        }
        for (name, v) in [
            ("source_fps", Some(self.source_fps)),
            ("target_fps", self.target_fps),
        ] {
            if let Some(v) = v {
                if !(v > 0.0) {
                    return Err(PrepError::InvalidArgument(format!(
                        "{name} must be positive, got {v}"
                    )));
                }
            }
        }
        for (name, v) in [("start", self.start), ("duration", self.duration)] {
            if let Some(v) = v {
                if !(v >= 0.0) {
                    return Err(PrepError::InvalidArgument(format!(
                        "{name} must not be negative, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn video_filter(&self) -> String {
        let mut vf = format!("scale={}:-2", self.width);
        if let Some(target_fps) = self.target_fps {
            vf.push_str(&format!(",setpts={}/{}*PTS", self.source_fps, target_fps));
        }
        vf
    }
}

/// Arguments after the common ffmpeg prologue.
pub fn compress_args(input: &Path, output: &Path, opts: &CompressOpts) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), input.as_os_str().to_owned()];
    if let Some(start) = opts.start {
        args.push("-ss".into());
        args.push(start.to_string().into());
    }
    if let Some(duration) = opts.duration {
        args.push("-t".into());
        args.push(duration.to_string().into());
    }
    args.push("-vf".into());
    args.push(opts.video_filter().into());
    args.push("-c:v".into());
    args.push(opts.codec.clone().into());
    args.push("-crf".into());
    args.push(opts.crf.to_string().into());
    args.push("-preset".into());
    args.push(opts.preset.clone().into());
    args.push(output.as_os_str().to_owned());
    args
}

// rgb.mp4 + "_compressed" -> rgb_compressed.mp4, next to the input
pub fn compressed_name<AP>(input: AP, suffix: &str) -> Result<PathBuf, PrepError>
where
    AP: AsRef<Path>,
{
    let input = input.as_ref();
    let stem = input
        .file_stem()
        .ok_or_else(|| PrepError::InvalidArgument(format!("no file name in {input:?}")))?
        .to_str()
        .ok_or_else(|| PrepError::NonUtf8Name(input.to_path_buf()))?;
    Ok(input.with_file_name(format!("{stem}{suffix}.mp4")))
}

// Compares resolved locations, so `v.mp4`, `./v.mp4` and `sub/../v.mp4` all match.
// The output's parent must exist already.
fn same_file(input: &Path, output: &Path) -> Result<bool, PrepError> {
    let name = output
        .file_name()
        .ok_or_else(|| PrepError::InvalidArgument(format!("no file name in {output:?}")))?;
    let input = std::fs::canonicalize(input)?;
    if let Ok(existing) = std::fs::canonicalize(output) {
        return Ok(existing == input);
    }
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(std::fs::canonicalize(parent)?.join(name) == input)
}

pub fn compress_video<AP1, AP2>(
    ffmpeg: &Ffmpeg,
    input: AP1,
    output: AP2,
    opts: &CompressOpts,
) -> Result<PathBuf, PrepError>
where
    AP1: AsRef<Path>,
    AP2: AsRef<Path>,
{
    let (input, output) = (input.as_ref(), output.as_ref());
    opts.validate()?;
    if !input.is_file() {
        return Err(PrepError::MissingInput(input.to_path_buf()));
    }
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if same_file(input, output)? {
        return Err(PrepError::InvalidArgument(format!(
            "refusing to compress {input:?} onto itself ({output:?})"
        )));
    }

    ffmpeg.run(compress_args(input, output, opts))?;

    if !output.is_file() {
        return Err(PrepError::MissingOutput(output.to_path_buf()));
    }
    if opts.remove_source {
        std::fs::remove_file(input)?;
        tracing::debug!("removed source {input:?}");
    }
    tracing::info!("Compressed video saved to: {output:?}");
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    fn strings(args: &[OsString]) -> Vec<&str> {
        args.iter().map(|a| a.to_str().unwrap()).collect()
    }

    #[test]
    fn preview_args() {
        let args = compress_args(
            Path::new("vis/g/aa/preview.mp4"),
            Path::new("vis/g/aa/preview_compressed.mp4"),
            &CompressOpts::default(),
        );
        assert_eq!(
            strings(&args),
            vec![
                "-i",
                "vis/g/aa/preview.mp4",
                "-vf",
                "scale=480:-2",
                "-c:v",
                "libx264",
                "-crf",
                "28",
                "-preset",
                "medium",
                "vis/g/aa/preview_compressed.mp4",
            ]
        );
    }

    #[test]
    fn teaser_args_retime_and_trim() {
        let opts = CompressOpts {
            crf: 27,
            target_fps: Some(20.0),
            start: Some(0.0),
            duration: Some(20.0),
            ..Default::default()
        };
        let args = compress_args(Path::new("in.mp4"), Path::new("out.mp4"), &opts);
        assert_eq!(
            strings(&args),
            vec![
                "-i",
                "in.mp4",
                "-ss",
                "0",
                "-t",
                "20",
                "-vf",
                "scale=480:-2,setpts=30/20*PTS",
                "-c:v",
                "libx264",
                "-crf",
                "27",
                "-preset",
                "medium",
                "out.mp4",
            ]
        );
    }

    #[test]
    fn validation() {
        assert!(CompressOpts::default().validate().is_ok());
        let bad = [
            CompressOpts {
                width: 0,
                ..Default::default()
            },
            CompressOpts {
                crf: 60,
                ..Default::default()
            },
            CompressOpts {
                target_fps: Some(0.0),
                ..Default::default()
            },
            CompressOpts {
                duration: Some(-1.0),
                ..Default::default()
            },
        ];
        for opts in bad {
            assert!(
                matches!(opts.validate(), Err(PrepError::InvalidArgument(_))),
                "{opts:?}"
            );
        }
    }

    #[test]
    fn names() {
        assert_eq!(
            compressed_name("data/teaser_results/rgb.mp4", "_compressed").unwrap(),
            PathBuf::from("data/teaser_results/rgb_compressed.mp4")
        );
        assert_eq!(
            compressed_name("flow.mkv", "_small").unwrap(),
            PathBuf::from("flow_small.mp4")
        );
    }

    #[test]
    fn missing_input() {
        let temp = tempdir().unwrap();
        let res = compress_video(
            &Ffmpeg::new("true"),
            temp.path().join("nope.mp4"),
            temp.path().join("out.mp4"),
            &CompressOpts::default(),
        );
        assert!(matches!(res, Err(PrepError::MissingInput(_))));
    }

    #[test]
    fn other_spellings_of_the_input_are_refused() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("v.mp4");
        std::fs::write(&input, b"only copy").unwrap();
        let opts = CompressOpts {
            remove_source: true,
            ..Default::default()
        };
        for output in [
            input.clone(),
            temp.path().join(".").join("v.mp4"),
            temp.path().join("sub").join("..").join("v.mp4"),
        ] {
            let res = compress_video(&Ffmpeg::new("true"), &input, &output, &opts);
            assert!(
                matches!(res, Err(PrepError::InvalidArgument(_))),
                "{output:?}: {res:?}"
            );
            assert_eq!(std::fs::read(&input).unwrap(), b"only copy");
        }
    }

    #[test]
    fn output_without_file_name() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("v.mp4");
        std::fs::write(&input, b"x").unwrap();
        let res = compress_video(
            &Ffmpeg::new("true"),
            &input,
            temp.path().join(".."),
            &CompressOpts::default(),
        );
        assert!(matches!(res, Err(PrepError::InvalidArgument(_))));
        assert!(input.exists());
    }

    #[cfg(unix)]
    #[test]
    fn silent_encoder_is_not_success() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("preview.mp4");
        std::fs::write(&input, b"not really a video").unwrap();
        let opts = CompressOpts {
            remove_source: true,
            ..Default::default()
        };
        // exits 0 without writing anything
        let res = compress_video(
            &Ffmpeg::new("true"),
            &input,
            temp.path().join("out").join("preview_compressed.mp4"),
            &opts,
        );
        assert!(matches!(res, Err(PrepError::MissingOutput(_))));
        assert!(input.exists(), "source must survive a failed compression");
    }

    #[cfg(unix)]
    #[test]
    fn failed_encoder_keeps_source() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("preview.mp4");
        std::fs::write(&input, b"x").unwrap();
        let opts = CompressOpts {
            remove_source: true,
            ..Default::default()
        };
        let res = compress_video(
            &Ffmpeg::new("false"),
            &input,
            temp.path().join("preview_compressed.mp4"),
            &opts,
        );
        assert!(matches!(res, Err(PrepError::ExternalTool { .. })));
        assert!(input.exists());
    }
}
