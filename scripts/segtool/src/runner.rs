//! 程序运行函数.

use log::{debug, error, info, warn};
use oct_berry::color;
use oct_berry::consts::{EXTENSION_COLOR_MAP, ORIGINAL_LABELS};
use oct_berry::prelude::*;
use oct_berry::Segment;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use utils::loader::{derived_path, seg_stem};

use crate::cli::Action;
use crate::result::{BatchReport, Outcome};

/// 处理单个文件时的错误.
#[derive(Debug, Error)]
pub enum TaskError {
    /// 读写 seg.nrrd 错误.
    #[error(transparent)]
    Nrrd(#[from] NrrdError),

    /// header/通道操作错误.
    #[error(transparent)]
    Seg(#[from] SegError),

    /// 保存叠加图错误.
    #[error("cannot write overlay: {0}")]
    Image(#[from] image::ImageError),

    /// 其他 I/O 错误.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 序列化列表错误.
    #[error("cannot serialize listing: {0}")]
    Json(#[from] serde_json::Error),
}

impl TaskError {
    /// 错误的严重程度.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Nrrd(e) => e.severity(),
            Self::Seg(e) => e.severity(),
            Self::Image(_) | Self::Io(_) | Self::Json(_) => Severity::Recoverable,
        }
    }
}

/// 批处理选项.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// 并行处理的文件数.
    pub jobs: usize,

    /// 遇到第一个失败的文件即停止.
    pub fail_fast: bool,
}

/// 对 `files` 逐个执行 `action`.
///
/// 出现致命错误 (或 `fail_fast` 时出现任何失败) 后, 尚未开始的文件不再处理.
/// 同一文件上的操作总是串行的.
pub fn run(
    files: &[PathBuf],
    action: &Action,
    opts: RunOptions,
) -> Result<BatchReport, rayon::ThreadPoolBuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()?;
    let abort = AtomicBool::new(false);

    let outcomes: Vec<Outcome> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                if abort.load(Ordering::Acquire) {
                    return Outcome::NotStarted;
                }
                let outcome = outcome_of(path, process(path, action));
                if let Outcome::Failed { fatal, .. } = outcome {
                    if fatal || opts.fail_fast {
                        abort.store(true, Ordering::Release);
                    }
                }
                outcome
            })
            .collect()
    });
    Ok(files.iter().cloned().zip(outcomes).collect())
}

/// 将处理结果转换为 `Outcome`, 并记录日志.
fn outcome_of(path: &Path, r: Result<Outcome, TaskError>) -> Outcome {
    let p = path.display();
    match r {
        Ok(outcome) => {
            match &outcome {
                Outcome::Succeeded(m) => info!("{p}: {}", m.lines().next().unwrap_or_default()),
                Outcome::Skipped(m) | Outcome::Warned(m) => warn!("{p}: {m}"),
                _ => {}
            }
            outcome
        }
        Err(e) => match e.severity() {
            Severity::Warning => {
                warn!("{p}: {e}");
                Outcome::Warned(e.to_string())
            }
            Severity::Recoverable => {
                error!("{p}: {e}");
                Outcome::Failed {
                    message: e.to_string(),
                    fatal: false,
                }
            }
            Severity::Fatal => {
                error!("{p}: {e}. Stopping the batch");
                Outcome::Failed {
                    message: e.to_string(),
                    fatal: true,
                }
            }
        },
    }
}

/// `list --json` 的一行.
#[derive(Serialize)]
struct Row<'a> {
    #[serde(flatten)]
    segment: &'a Segment,
    voxels: usize,
}

fn list(volume: &SegVolume, json: bool) -> Result<String, TaskError> {
    let segments = volume.segments()?;
    let counts = volume.channels().par_counts();
    if json {
        let rows: Vec<Row> = segments
            .iter()
            .map(|s| Row {
                segment: s,
                voxels: counts[s.position],
            })
            .collect();
        return Ok(serde_json::to_string_pretty(&rows)?);
    }
    let lines: Vec<String> = segments
        .iter()
        .map(|s| {
            format!(
                "Segment{:<3} #{:<3} {:<6} {} [{}] {} voxels",
                s.index,
                s.position,
                s.name,
                color::encode(s.color),
                s.extent,
                counts[s.position]
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

fn check_unlabeled(volume: &SegVolume) -> Result<Outcome, TaskError> {
    let mut lines: Vec<String> = unlabeled_voxels(volume.channels())?
        .into_iter()
        .map(|s| {
            format!(
                "slice {}: {} voxels unlabeled at {:?}",
                s.z, s.count, s.locations
            )
        })
        .collect();
    for seg in volume.segments()? {
        if seg.color.is_black() {
            lines.push(format!("{} is displayed in black", seg.name));
        }
    }
    Ok(if lines.is_empty() {
        Outcome::Succeeded("no unlabeled voxels".to_string())
    } else {
        Outcome::Warned(lines.join("\n"))
    })
}

fn overlay(path: &Path, volume: &SegVolume, out: &Path, palette: bool) -> Result<Outcome, TaskError> {
    let depth = match volume.channels().spatial_shape() {
        &[_, _, d] => d,
        s => {
            return Err(SegError::Dimensionality {
                expected: 3,
                found: s.len(),
            }
            .into())
        }
    };
    let colors = if palette {
        // 调色板第 0 项为背景. 通道多于调色板时循环使用.
        let all = color::oct_palette();
        all[1..]
            .iter()
            .copied()
            .cycle()
            .take(volume.channels().len())
            .collect()
    } else {
        color::decode(volume.header())?
    };

    fs::create_dir_all(out)?;
    let stem = seg_stem(path);
    for z in 0..depth {
        overlay_slice(volume.channels(), &colors, z)?.save(out.join(format!("{stem}_{z:03}.png")))?;
    }
    Ok(Outcome::Succeeded(format!(
        "{depth} overlays written to {}",
        out.display()
    )))
}

/// 若 `new != old` 则覆盖写回 `path`.
fn save_if_changed(path: &Path, old: &SegVolume, new: &SegVolume, done: String, unchanged: &str) -> Result<Outcome, TaskError> {
    if new == old {
        Ok(Outcome::Skipped(unchanged.to_string()))
    } else {
        new.save(path)?;
        Ok(Outcome::Succeeded(done))
    }
}

fn process(path: &Path, action: &Action) -> Result<Outcome, TaskError> {
    let volume = SegVolume::open(path)?;
    debug!("{}: shape {:?}", path.display(), volume.channels().shape());

    let outcome = match action {
        Action::List { json } => Outcome::Succeeded(list(&volume, *json)?),
        Action::Add => {
            let (out, statuses) = add_segments(&volume, &EXTENSION_COLOR_MAP)?;
            let added = statuses.iter().filter(|s| s.is_added()).count();
            save_if_changed(
                path,
                &volume,
                &out,
                format!("added {added} segments"),
                "all extension labels present",
            )?
        }
        Action::Delete { label } => {
            let out = delete_segment_by_name(&volume, label, &DeletePolicy::default())?;
            out.save(path)?;
            Outcome::Succeeded(format!("deleted {label}"))
        }
        Action::Validate { force } => {
            let out = validate_and_trim(&volume, &ORIGINAL_LABELS, *force)?;
            let removed = volume.channels().len() - out.channels().len();
            save_if_changed(
                path,
                &volume,
                &out,
                format!("removed {removed} extra labels"),
                "original labels in order",
            )?
        }
        Action::Correct { force } => {
            let (out, _) = correct_labels(&volume, &ORIGINAL_LABELS, &EXTENSION_COLOR_MAP, *force)?;
            save_if_changed(
                path,
                &volume,
                &out,
                format!("corrected to {} labels", out.channels().len()),
                "already corrected",
            )?
        }
        Action::Erase { label } => {
            let out = clear_segment_data(&volume, label)?;
            out.save(path)?;
            Outcome::Succeeded(format!("erased the mask of {label}"))
        }
        Action::RemoveSlice { slice, dry_run } => {
            let out = remove_slice(&volume, *slice)?;
            let msg = format!(
                "shape {:?} -> {:?}",
                volume.channels().shape(),
                out.channels().shape()
            );
            if *dry_run {
                Outcome::Succeeded(format!("dry run, {msg}"))
            } else {
                let dest = derived_path(path);
                out.save(&dest)?;
                Outcome::Succeeded(format!("{msg}, written to {}", dest.display()))
            }
        }
        &Action::Crop {
            left,
            right,
            up,
            down,
        } => {
            let margins = CropMargins {
                left,
                right,
                up,
                down,
            };
            let out = crop_xy(&volume, &margins)?;
            let dest = derived_path(path);
            out.save(&dest)?;
            Outcome::Succeeded(format!(
                "shape {:?} -> {:?}, written to {}",
                volume.channels().shape(),
                out.channels().shape(),
                dest.display()
            ))
        }
        Action::CheckUnlabeled => check_unlabeled(&volume)?,
        Action::Overlay { out, palette } => overlay(path, &volume, out, *palette)?,
        Action::Renumber => {
            let out = renumber_segments(&volume)?;
            save_if_changed(
                path,
                &volume,
                &out,
                "renumbered segments".to_string(),
                "suffixes already match positions",
            )?
        }
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oct_berry::consts::full_labels;
    use oct_berry::engine::new_segment_fields;

    fn write_sample(dir: &Path, name: &str, labels: &[&str]) -> PathBuf {
        let mut header = HeaderStore::new();
        header.insert("type", "uint8");
        header.insert("dimension", "4");
        header.set_sizes(&[labels.len(), 3, 2, 2]);
        header.insert("encoding", "gzip");
        for (i, label) in labels.iter().enumerate() {
            let at = header.len();
            header
                .splice_at(at, new_segment_fields(i, label, "0.5 0.5 0.5"))
                .unwrap();
        }
        let mut channels = ChannelArray::zeros(labels.len(), &[3, 2, 2]);
        channels.channel_mut(0).fill(1);

        let path = dir.join(name);
        SegVolume::new(header, channels).unwrap().save(&path).unwrap();
        path
    }

    fn one_job() -> RunOptions {
        RunOptions {
            jobs: 1,
            fail_fast: false,
        }
    }

    #[test]
    fn test_correct_with_force() {
        let dir = tempfile::tempdir().unwrap();
        let mut labels = ORIGINAL_LABELS.to_vec();
        labels.insert(3, "X");
        let p = write_sample(dir.path(), "a.seg.nrrd", &labels);

        let outcome = outcome_of(&p, process(&p, &Action::Correct { force: true }));
        assert!(matches!(outcome, Outcome::Succeeded(_)));
        let v = SegVolume::open(&p).unwrap();
        assert_eq!(v.registry().unwrap().names(), full_labels());

        // 没有 --force 时, 扩展标签本身就是多余的标签.
        let outcome = outcome_of(&p, process(&p, &Action::Correct { force: false }));
        assert!(matches!(outcome, Outcome::Failed { fatal: false, .. }));
    }

    #[test]
    fn test_fatal_error_stops_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut partial = ORIGINAL_LABELS.to_vec();
        partial.push("CHO");
        let files = [
            write_sample(dir.path(), "1.seg.nrrd", &ORIGINAL_LABELS),
            write_sample(dir.path(), "2.seg.nrrd", &partial),
            write_sample(dir.path(), "3.seg.nrrd", &ORIGINAL_LABELS),
        ];
        let report = run(&files, &Action::Add, one_job()).unwrap();
        let t = report.tally();
        assert_eq!((t.succeeded, t.failed, t.not_started), (1, 1, 1));
        assert_eq!(report.exit_code(), 2);
        // 失败的文件保持不变.
        assert_eq!(SegVolume::open(&files[1]).unwrap().channels().len(), 8);
    }

    #[test]
    fn test_fail_fast() {
        let dir = tempfile::tempdir().unwrap();
        let files = [
            write_sample(dir.path(), "1.seg.nrrd", &["A", "B"]),
            write_sample(dir.path(), "2.seg.nrrd", &["A", "B"]),
        ];
        let action = Action::Erase {
            label: "X".to_string(),
        };
        // 标签不存在只是警告.
        let report = run(&files, &action, one_job()).unwrap();
        assert_eq!(report.tally().warned, 2);
        assert_eq!(report.exit_code(), 0);

        let action = Action::Validate { force: false };
        let opts = RunOptions {
            fail_fast: true,
            ..one_job()
        };
        let report = run(&files, &action, opts).unwrap();
        let t = report.tally();
        assert_eq!((t.failed, t.not_started), (1, 1));
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_remove_slice_writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_sample(dir.path(), "P1.seg.nrrd", &["A"]);
        let dest = dir.path().join("P1-new.seg.nrrd");

        let action = Action::RemoveSlice {
            slice: 1,
            dry_run: true,
        };
        assert!(matches!(process(&p, &action).unwrap(), Outcome::Succeeded(_)));
        assert!(!dest.exists());

        let action = Action::RemoveSlice {
            slice: 1,
            dry_run: false,
        };
        process(&p, &action).unwrap();
        let v = SegVolume::open(&dest).unwrap();
        assert_eq!(v.header().sizes().unwrap(), &[1, 3, 2, 1]);
        assert_eq!(SegVolume::open(&p).unwrap().channels().shape(), &[1, 3, 2, 2]);
    }

    #[test]
    fn test_check_unlabeled_and_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_sample(dir.path(), "P2.seg.nrrd", &["A", "B"]);
        assert_eq!(
            process(&p, &Action::CheckUnlabeled).unwrap(),
            Outcome::Succeeded("no unlabeled voxels".to_string())
        );

        let out = dir.path().join("overlays");
        let action = Action::Overlay {
            out: out.clone(),
            palette: false,
        };
        assert!(matches!(process(&p, &action).unwrap(), Outcome::Succeeded(_)));
        assert!(out.join("P2_000.png").is_file());
        assert!(out.join("P2_001.png").is_file());
    }

    #[test]
    fn test_list_json() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_sample(dir.path(), "P3.seg.nrrd", &["A", "B"]);
        let Outcome::Succeeded(text) = process(&p, &Action::List { json: true }).unwrap() else {
            panic!("listing failed")
        };
        let rows: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(rows[0]["name"], "A");
        assert_eq!(rows[0]["voxels"], 12);
        assert_eq!(rows[1]["position"], 1);
        assert_eq!(rows[1]["voxels"], 0);
    }
}
