use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ChildStdin;

use image::imageops::{resize, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::data::Dim;
use crate::ffmpeg::Ffmpeg;
use crate::{PrepError, DEFAULT_FPS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssembleOpts {
    pub fps: f64,
    // frame files are picked by extension, compared case-sensitively
    pub extension: String,
    // mpeg4 is what the mp4v fourcc produces
    pub codec: String,
    // Scale down to a max specified width, keeping the aspect ratio
    pub max_width: Option<u32>,
}

impl Default for AssembleOpts {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            extension: String::from("png"),
            codec: String::from("mpeg4"),
            max_width: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssembleOutcome {
    pub frames: usize,
    pub dim: Dim,
    pub output: PathBuf,
}

/// Frame files in `dir` with the given extension, sorted by name.
///
/// Zero padded frame numbers make name order the playback order.
pub fn collect_frames<AP>(dir: AP, extension: &str) -> Result<Vec<PathBuf>, PrepError>
where
    AP: AsRef<Path>,
{
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(PrepError::MissingInput(dir.to_path_buf()));
    }
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(extension))
        .collect();
    frames.sort();
    Ok(frames)
}

fn image_dim(img: &RgbImage) -> Dim {
    Dim {
        width: img.width(),
        height: img.height(),
    }
}

// Target size after the optional downscale; yuv420p needs both sides even
fn target_dim(src: Dim, max_width: Option<u32>) -> Dim {
    let (width, height) = match max_width {
        Some(max_width) if max_width < src.width => {
            let height = ((max_width as f64) * (src.height as f64 / src.width as f64)) as u32;
            (max_width, height)
        }
        _ => (src.width, src.height),
    };
    Dim {
        width: width & !1,
        height: height & !1,
    }
}

fn fit_frame(img: RgbImage, tgt: Dim) -> RgbImage {
    if image_dim(&img) == tgt {
        return img;
    }
    if img.width() - tgt.width <= 1 && img.height() - tgt.height <= 1 {
        // odd sized source; drop the last row / column rather than resample
        return image::imageops::crop_imm(&img, 0, 0, tgt.width, tgt.height).to_image();
    }
    resize(&img, tgt.width, tgt.height, FilterType::Triangle)
}

fn stream_frames(
    stdin: &mut ChildStdin,
    first: RgbImage,
    rest: &[PathBuf],
    tgt: Dim,
) -> Result<usize, PrepError> {
    let src = image_dim(&first);
    stdin.write_all(fit_frame(first, tgt).as_raw())?;
    let mut written = 1;
    for path in rest {
        let frame = image::open(path)?.to_rgb8();
        let found = image_dim(&frame);
        if found != src {
            return Err(PrepError::FrameSizeMismatch {
                path: path.clone(),
                expected: src,
                found,
            });
        }
        stdin.write_all(fit_frame(frame, tgt).as_raw())?;
        written += 1;
    }
    Ok(written)
}

/// Encode the frames of `frames_dir` into a single video at `out_path`.
///
/// Frames are decoded here and handed to ffmpeg as raw rgb24 on stdin, so every frame must
/// share the first frame's dimensions. A partially written output is removed on failure.
pub fn assemble_video<AP1, AP2>(
    ffmpeg: &Ffmpeg,
    frames_dir: AP1,
    out_path: AP2,
    opts: &AssembleOpts,
) -> Result<AssembleOutcome, PrepError>
where
    AP1: AsRef<Path>,
    AP2: AsRef<Path>,
{
    let frames_dir = frames_dir.as_ref();
    let out_path = out_path.as_ref();
    if !(opts.fps > 0.0) {
        return Err(PrepError::InvalidArgument(format!(
            "frame rate must be positive, got {}",
            opts.fps
        )));
    }
    let frames = collect_frames(frames_dir, &opts.extension)?;
    let Some((first_path, rest)) = frames.split_first() else {
        return Err(PrepError::EmptyFrameSequence(frames_dir.to_path_buf()));
    };

    let first = image::open(first_path)?.to_rgb8();
    let src = image_dim(&first);
    src.check_bounds()?;
    let tgt = target_dim(src, opts.max_width);
    tgt.check_bounds()?;

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let args: Vec<OsString> = vec![
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "-video_size".into(),
        tgt.as_video_size().into(),
        "-framerate".into(),
        opts.fps.to_string().into(),
        "-i".into(),
        "-".into(),
        "-c:v".into(),
        opts.codec.clone().into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        out_path.as_os_str().to_owned(),
    ];
    let mut child = ffmpeg.spawn_piped(args)?;

    let streamed = match child.take_stdin() {
        Some(mut stdin) => stream_frames(&mut stdin, first, rest, tgt),
        None => Err(PrepError::IoErr(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "encoder stdin unavailable",
        ))),
    };
    // stdin is closed by now; the encoder flushes and exits
    let output = child.wait()?;

    match streamed {
        Ok(frames) => {
            ffmpeg.check(output)?;
            if !out_path.exists() {
                return Err(PrepError::MissingOutput(out_path.to_path_buf()));
            }
            Ok(AssembleOutcome {
                frames,
                dim: tgt,
                output: out_path.to_path_buf(),
            })
        }
        Err(e) => {
            let _ = std::fs::remove_file(out_path);
            // a broken pipe just means the encoder died first; its stderr says why
            match e {
                PrepError::IoErr(_) if !output.status.success() => {
                    Err(ffmpeg.failure(output.status, &output.stderr))
                }
                e => Err(e),
            }
        }
    }
}
