use std::path::PathBuf;

use structopt::StructOpt;
use vidset_prep::compress::{compress_video, compressed_name, CompressOpts};
use vidset_prep::ffmpeg::Ffmpeg;
use vidset_prep::frames::{assemble_video, AssembleOpts};
use vidset_prep::log::init_logging;
use vidset_prep::PrepError;

#[derive(Debug, StructOpt, Clone)]
#[structopt(name = "assemble-frames", about = "Frame folder to video")]
struct Opt {
    // Folder of numbered frames
    #[structopt(short = "i", long)]
    src: PathBuf,

    // Video file to write
    #[structopt(short = "o", long)]
    out: PathBuf,

    #[structopt(long, default_value = "30")]
    fps: f64,

    // Frame file extension
    #[structopt(long, default_value = "png")]
    ext: String,

    // Scale down to a max specified width
    #[structopt(long = "max-width")]
    max_width: Option<u32>,

    // Additionally write a libx264 copy of this width next to the output
    #[structopt(long)]
    compress_width: Option<u32>,

    // ffmpeg executable; defaults to $FFMPEG, then PATH
    #[structopt(long)]
    ffmpeg: Option<PathBuf>,
}

// Handy for eyeballing a single sample without running the whole release batch
fn main() -> Result<(), PrepError> {
    init_logging("info");
    let opt = Opt::from_args();
    tracing::debug!("opt: {opt:?}");

    let ffmpeg = match opt.ffmpeg {
        Some(ref program) => Ffmpeg::new(program),
        None => Ffmpeg::from_env(),
    };
    let assemble = AssembleOpts {
        fps: opt.fps,
        extension: opt.ext.clone(),
        max_width: opt.max_width,
        ..Default::default()
    };
    let outcome = assemble_video(&ffmpeg, &opt.src, &opt.out, &assemble)?;
    tracing::info!(
        "Video saved to {:?}: {} frames of {}x{}",
        outcome.output,
        outcome.frames,
        outcome.dim.width,
        outcome.dim.height
    );

    if let Some(width) = opt.compress_width {
        let compress = CompressOpts {
            width,
            source_fps: assemble.fps,
            ..Default::default()
        };
        let compressed = compressed_name(&opt.out, "_compressed")?;
        compress_video(&ffmpeg, &opt.out, &compressed, &compress)?;
    }
    Ok(())
}
