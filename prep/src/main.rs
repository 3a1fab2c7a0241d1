use std::path::{Path, PathBuf};
use std::time::Instant;

use structopt::StructOpt;

use vidset_prep::alias::{alias_for, parse_position, position_of};
use vidset_prep::batch::{compress_many, export_metadata, make_previews, plan_groups};
use vidset_prep::compress::CompressOpts;
use vidset_prep::config::PrepConfig;
use vidset_prep::layout::write_manifest;
use vidset_prep::log::init_logging;
use vidset_prep::PrepError;

#[derive(Debug, StructOpt, Clone)]
#[structopt(name = "vidset-prep", about = "Dataset release preparation")]
struct Opt {
    // JSON job file; flags below override it
    #[structopt(short, long)]
    config: Option<PathBuf>,

    // Folder holding the top level groups
    #[structopt(short, long)]
    input_root: Option<PathBuf>,

    // Top level groups to process (repeatable); aliases restart per group
    #[structopt(short, long = "group")]
    groups: Vec<String>,

    // ffmpeg executable; defaults to $FFMPEG, then PATH
    #[structopt(long)]
    ffmpeg: Option<PathBuf>,

    // Display Timing info
    #[structopt(long)]
    timing: bool,

    #[structopt(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, StructOpt, Clone)]
enum Cmd {
    /// Print the alias of each 1-based position, or the position of each alias
    Alias {
        // Positions (1..=676) or, with --reverse, two letter aliases
        #[structopt(required = true)]
        values: Vec<String>,

        #[structopt(short, long)]
        reverse: bool,
    },
    /// Show how sample folders map onto aliases
    Plan {
        // Output root the aliases are placed under
        #[structopt(short, long, default_value = "vis")]
        out_dir: PathBuf,

        // Also write the name -> alias mapping as JSON
        #[structopt(long)]
        manifest: Option<PathBuf>,
    },
    /// Assemble and compress a preview video for every sample
    Previews {
        #[structopt(short, long)]
        out_dir: Option<PathBuf>,

        // Sub-folder of each sample with the frames
        #[structopt(long)]
        frames_subdir: Option<String>,

        #[structopt(long)]
        fps: Option<f64>,

        // Compressed preview width
        #[structopt(long)]
        width: Option<u32>,

        // Keep preview.mp4 next to the compressed copy
        #[structopt(long)]
        keep_uncompressed: bool,

        // Write the name -> alias mapping as JSON
        #[structopt(long)]
        manifest: Option<PathBuf>,
    },
    /// Zip / copy selected per-sample files into an aliased tree
    Export {
        #[structopt(short, long)]
        out_dir: Option<PathBuf>,

        // Files or folders of each sample to export (repeatable)
        #[structopt(short, long = "key")]
        keys: Vec<String>,

        #[structopt(long)]
        manifest: Option<PathBuf>,
    },
    /// Recompress standalone videos
    Compress {
        #[structopt(required = true)]
        inputs: Vec<PathBuf>,

        // Where outputs go; defaults to next to each input
        #[structopt(short, long)]
        out_dir: Option<PathBuf>,

        #[structopt(long, default_value = "_compressed")]
        suffix: String,

        #[structopt(long, default_value = "480")]
        width: u32,

        #[structopt(long, default_value = "28")]
        crf: u8,

        #[structopt(long, default_value = "medium")]
        preset: String,

        // Retime to this frame rate, keeping every frame
        #[structopt(long)]
        target_fps: Option<f64>,

        #[structopt(long, default_value = "30")]
        source_fps: f64,

        // Seconds to skip
        #[structopt(long)]
        start: Option<f64>,

        // Seconds to keep
        #[structopt(long)]
        duration: Option<f64>,

        #[structopt(long)]
        remove_source: bool,
    },
}

fn main() -> Result<(), PrepError> {
    init_logging("info");
    let opt = Opt::from_args();
    tracing::debug!("Opts: {:?}", opt);

    let cfg = load_config(&opt)?;
    let ffmpeg = cfg.ffmpeg();

    let st = Instant::now();
    let report = match opt.cmd {
        Cmd::Alias { values, reverse } => {
            for v in values {
                if reverse {
                    println!("{v}\t{}", position_of(&v)?);
                } else {
                    let position = parse_position(&v)?;
                    println!("{position}\t{}", alias_for(position)?);
                }
            }
            None
        }
        Cmd::Plan { out_dir, manifest } => {
            let (plans, report) = plan_groups(&cfg.input_root, &cfg.groups, &out_dir);
            for plan in plans.iter() {
                for sample in plan.samples.iter() {
                    println!(
                        "{}\t{}\t{}",
                        sample.source_dir.display(),
                        sample.alias,
                        sample.output_dir.display()
                    );
                }
            }
            if let Some(path) = manifest {
                write_manifest(&plans, &path)?;
            }
            Some(report)
        }
        Cmd::Previews {
            out_dir,
            frames_subdir,
            fps,
            width,
            keep_uncompressed,
            manifest,
        } => {
            let mut cfg = cfg;
            if let Some(out_dir) = out_dir {
                cfg.previews.output_root = out_dir;
            }
            if let Some(frames_subdir) = frames_subdir {
                cfg.previews.frames_subdir = frames_subdir;
            }
            if let Some(fps) = fps {
                cfg.previews.assemble.fps = fps;
            }
            if let Some(width) = width {
                cfg.previews.compress.width = width;
            }
            cfg.previews.keep_uncompressed |= keep_uncompressed;
            if let Some(path) = manifest {
                write_manifest_for(&cfg, &cfg.previews.output_root, &path)?;
            }
            Some(make_previews(&ffmpeg, &cfg))
        }
        Cmd::Export {
            out_dir,
            keys,
            manifest,
        } => {
            let mut cfg = cfg;
            if let Some(out_dir) = out_dir {
                cfg.export.output_root = out_dir;
            }
            if !keys.is_empty() {
                cfg.export.keys = keys;
            }
            if let Some(path) = manifest {
                write_manifest_for(&cfg, &cfg.export.output_root, &path)?;
            }
            Some(export_metadata(&cfg))
        }
        Cmd::Compress {
            inputs,
            out_dir,
            suffix,
            width,
            crf,
            preset,
            target_fps,
            source_fps,
            start,
            duration,
            remove_source,
        } => {
            let opts = CompressOpts {
                width,
                crf,
                preset,
                target_fps,
                source_fps,
                start,
                duration,
                remove_source,
                ..Default::default()
            };
            opts.validate()?;
            Some(compress_many(
                &ffmpeg,
                &inputs,
                out_dir.as_deref(),
                &suffix,
                &opts,
            ))
        }
    };
    log_timing(opt.timing, st, "Batch");

    match report {
        Some(report) if !report.is_clean() => {
            for failure in report.failed.iter() {
                tracing::error!("failed: {} ({})", failure.item, failure.reason);
            }
            std::process::exit(1);
        }
        _ => Ok(()),
    }
}

fn load_config(opt: &Opt) -> Result<PrepConfig, PrepError> {
    let mut cfg = match opt.config {
        Some(ref path) => PrepConfig::with_json_file(path)?,
        None => PrepConfig::default(),
    };
    if let Some(ref input_root) = opt.input_root {
        cfg.input_root = input_root.clone();
    }
    if !opt.groups.is_empty() {
        cfg.groups = opt.groups.clone();
    }
    if let Some(ref ffmpeg) = opt.ffmpeg {
        cfg.ffmpeg = Some(ffmpeg.clone());
    }
    Ok(cfg)
}

// Group planning failures surface again in the batch itself
fn write_manifest_for(cfg: &PrepConfig, output_root: &Path, path: &Path) -> Result<(), PrepError> {
    let (plans, _report) = plan_groups(&cfg.input_root, &cfg.groups, output_root);
    write_manifest(&plans, path)
}

// Log based on whether we are recording timing the time since the last
// starting point
fn log_timing(timing: bool, st: Instant, msg: &str) {
    if timing {
        let took = Instant::now().duration_since(st);
        tracing::info!("{msg} took: {}ms", took.as_millis());
    }
}
