use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::archive::{export_selected, ExportOutcome};
use crate::compress::{compress_video, compressed_name, CompressOpts};
use crate::config::PrepConfig;
use crate::ffmpeg::Ffmpeg;
use crate::frames::assemble_video;
use crate::layout::{plan_group, GroupPlan, SamplePlan};
use crate::PrepError;

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub reason: String,
}

// What happened to every item of a batch. Item errors land here instead of
// stopping the batch.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn success(&mut self, item: String) {
        self.succeeded.push(item);
    }

    pub fn skip(&mut self, item: String, why: &str) {
        tracing::warn!("skipping {item}: {why}");
        self.skipped.push(item);
    }

    pub fn fail<E>(&mut self, item: String, err: &E)
    where
        E: Display + ?Sized,
    {
        tracing::error!("{item} failed: {err}");
        self.failed.push(ItemFailure {
            item,
            reason: err.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn log_summary(&self, what: &str) {
        tracing::info!(
            "{what}: {} succeeded, {} skipped, {} failed",
            self.succeeded.len(),
            self.skipped.len(),
            self.failed.len()
        );
    }
}

fn sample_item(plan: &GroupPlan, sample: &SamplePlan) -> String {
    format!("{}/{} ({})", plan.group, sample.alias, sample.name)
}

// Alias every configured group under `output_root`; a group that can't be planned is a
// failed item and the remaining groups still get planned.
pub fn plan_groups<AP1, AP2>(
    input_root: AP1,
    groups: &[String],
    output_root: AP2,
) -> (Vec<GroupPlan>, BatchReport)
where
    AP1: AsRef<Path>,
    AP2: AsRef<Path>,
{
    let mut report = BatchReport::default();
    let mut plans = Vec::with_capacity(groups.len());
    for group in groups {
        match plan_group(input_root.as_ref(), group, output_root.as_ref()) {
            Ok(plan) => plans.push(plan),
            Err(e) => report.fail(group.clone(), &e),
        }
    }
    (plans, report)
}

// Frames -> preview.mp4 -> preview_compressed.mp4 for every sample of every group.
pub fn make_previews(ffmpeg: &Ffmpeg, cfg: &PrepConfig) -> BatchReport {
    let pv = &cfg.previews;
    let (plans, mut report) = plan_groups(&cfg.input_root, &cfg.groups, &pv.output_root);
    let compress = CompressOpts {
        remove_source: !pv.keep_uncompressed,
        ..pv.compress.clone()
    };

    for plan in plans.iter() {
        for sample in plan.samples.iter() {
            let item = sample_item(plan, sample);
            let frames_dir = sample.source_dir.join(&pv.frames_subdir);
            let preview = sample.output_dir.join(&pv.preview_name);
            let compressed = sample.output_dir.join(&pv.compressed_name);

            match assemble_video(ffmpeg, &frames_dir, &preview, &pv.assemble) {
                Ok(outcome) => {
                    tracing::info!(
                        "Video saved to {:?} ({} frames, {}x{})",
                        outcome.output,
                        outcome.frames,
                        outcome.dim.width,
                        outcome.dim.height
                    );
                }
                Err(PrepError::EmptyFrameSequence(dir)) => {
                    report.skip(item, &format!("no frames found in {dir:?}"));
                    continue;
                }
                Err(e) => {
                    report.fail(item, &e);
                    continue;
                }
            }

            match compress_video(ffmpeg, &preview, &compressed, &compress) {
                Ok(_) => report.success(item),
                Err(e) => report.fail(item, &e),
            }
        }
    }
    report.log_summary("previews");
    report
}

// Selected per-sample files and folders into `<export.output_root>/<group>/<alias>/`.
pub fn export_metadata(cfg: &PrepConfig) -> BatchReport {
    let ex = &cfg.export;
    let (plans, mut report) = plan_groups(&cfg.input_root, &cfg.groups, &ex.output_root);

    for plan in plans.iter() {
        for sample in plan.samples.iter() {
            let item = sample_item(plan, sample);
            match export_selected(&sample.source_dir, &sample.output_dir, &ex.keys) {
                Ok(outcomes) => {
                    let exported = outcomes
                        .iter()
                        .filter(|o| !matches!(o, ExportOutcome::Missing { .. }))
                        .count();
                    if exported == 0 {
                        report.skip(item, "none of the selected keys exist");
                    } else {
                        report.success(item);
                    }
                }
                Err(e) => report.fail(item, &e),
            }
        }
    }
    report.log_summary("export");
    report
}

// Compress standalone videos; each lands next to its input (or in `out_dir`) as
// `<stem><suffix>.mp4`.
pub fn compress_many(
    ffmpeg: &Ffmpeg,
    inputs: &[PathBuf],
    out_dir: Option<&Path>,
    suffix: &str,
    opts: &CompressOpts,
) -> BatchReport {
    let mut report = BatchReport::default();
    for input in inputs {
        let item = input.display().to_string();
        let output = match compressed_name(input, suffix) {
            Ok(name) => match (out_dir, name.file_name()) {
                (Some(dir), Some(file_name)) => dir.join(file_name),
                _ => name,
            },
            Err(e) => {
                report.fail(item, &e);
                continue;
            }
        };
        match compress_video(ffmpeg, input, &output, opts) {
            Ok(_) => report.success(item),
            Err(e) => report.fail(item, &e),
        }
    }
    report.log_summary("compress");
    report
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn frames(dir: &Path, n: usize) {
        std::fs::create_dir_all(dir).unwrap();
        for i in 0..n {
            RgbImage::from_pixel(32, 32, Rgb([0, 128, 255]))
                .save(dir.join(format!("{i:06}.png")))
                .unwrap();
        }
    }

    fn config(root: &Path) -> PrepConfig {
        let mut cfg = PrepConfig {
            input_root: root.join("data"),
            groups: vec![String::from("indoor_train"), String::from("outdoor_train")],
            ..Default::default()
        };
        cfg.previews.output_root = root.join("vis");
        cfg.export.output_root = root.join("individual");
        cfg
    }

    #[test]
    fn missing_group_does_not_stop_the_others() {
        let temp = tempdir().unwrap();
        let cfg = config(temp.path());
        std::fs::create_dir_all(cfg.input_root.join("outdoor_train").join("s1")).unwrap();

        let (plans, report) = plan_groups(&cfg.input_root, &cfg.groups, "vis");
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].group, "outdoor_train");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].item, "indoor_train");
    }

    #[cfg(unix)]
    #[test]
    fn previews_keep_going_past_failures() {
        let temp = tempdir().unwrap();
        let cfg = config(temp.path());
        let indoor = cfg.input_root.join("indoor_train");
        frames(&indoor.join("b_scene").join("clean_uint8"), 2);
        frames(&indoor.join("a_scene").join("clean_uint8"), 2);
        // no frames at all
        std::fs::create_dir_all(indoor.join("c_scene").join("clean_uint8")).unwrap();

        let report = make_previews(&Ffmpeg::new("false"), &cfg);
        assert!(!report.is_clean());
        // the missing outdoor group plus both scenes whose encoder failed
        assert_eq!(report.failed.len(), 3);
        assert_eq!(report.skipped, vec!["indoor_train/ac (c_scene)"]);
        assert!(report.succeeded.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn previews_land_under_aliases() {
        let temp = tempdir().unwrap();
        let mut cfg = config(temp.path());
        cfg.groups = vec![String::from("indoor_train")];
        let indoor = cfg.input_root.join("indoor_train");
        frames(&indoor.join("scene_b").join("clean_uint8"), 3);
        frames(&indoor.join("scene_a").join("clean_uint8"), 2);

        let encoder = crate::ffmpeg::stand_in::copy_stdin_to_output(temp.path());
        let report = make_previews(&Ffmpeg::new(encoder), &cfg);
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(
            report.succeeded,
            vec!["indoor_train/aa (scene_a)", "indoor_train/ab (scene_b)"]
        );
        let ab = cfg.previews.output_root.join("indoor_train").join("ab");
        assert!(ab.join("preview_compressed.mp4").exists());
        // intermediate removed once compressed
        assert!(!ab.join("preview.mp4").exists());
    }

    #[test]
    fn export_per_alias() {
        let temp = tempdir().unwrap();
        let cfg = config(temp.path());
        for (group, sample) in [
            ("indoor_train", "s2"),
            ("indoor_train", "s1"),
            ("outdoor_train", "s9"),
        ] {
            let dir = cfg.input_root.join(group).join(sample);
            std::fs::create_dir_all(&dir).unwrap();
            if sample != "s9" {
                std::fs::write(dir.join("metadata.json"), b"{}").unwrap();
            }
        }

        let report = export_metadata(&cfg);
        assert!(report.is_clean());
        assert_eq!(
            report.succeeded,
            vec!["indoor_train/aa (s1)", "indoor_train/ab (s2)"]
        );
        assert_eq!(report.skipped, vec!["outdoor_train/aa (s9)"]);
        assert!(cfg
            .export
            .output_root
            .join("indoor_train")
            .join("ab")
            .join("metadata.json")
            .exists());
    }

    #[cfg(unix)]
    #[test]
    fn compress_many_reports_each_input() {
        let temp = tempdir().unwrap();
        let rgb = temp.path().join("rgb.mp4");
        std::fs::write(&rgb, b"x").unwrap();
        let inputs = vec![rgb, temp.path().join("depth.mp4")];

        let encoder = crate::ffmpeg::stand_in::copy_stdin_to_output(temp.path());
        let out = temp.path().join("compressed");
        let report = compress_many(
            &Ffmpeg::new(encoder),
            &inputs,
            Some(&out),
            "_compressed",
            &CompressOpts::default(),
        );
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(out.join("rgb_compressed.mp4").exists());
    }
}
