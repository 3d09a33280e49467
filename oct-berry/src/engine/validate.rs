use log::warn;

use super::delete::remove_segment;
use super::{add_segments, AddStatus, SegVolume};
use crate::error::SegError;
use crate::registry;
use crate::SegResult;

/// 检查 `required` 中的标签是否恰好占据序位 `0..required.len()`, 并按其顺序排列.
///
/// 1. 发现不在 `required` 中的 segment 时: 若 `force == false` 返回
///    `Err(SegError::UnexpectedLabel)` (按索引从大到小, 报告第一个), 否则 (绕过删除保护) 删除该 segment 并继续;
/// 2. `required` 中有标签缺失时返回 `Err(SegError::MissingLabel)`;
/// 3. 标签齐全但有重名时返回 `Err(SegError::DuplicateNames)`;
/// 4. 标签顺序与 `required` 不符时返回 `Err(SegError::OutOfOrder)`.
///    顺序按删除后的序位判断, 与键后缀无关.
///
/// 返回修剪后的 `SegVolume`. `force == false` 且校验通过时, 返回值与输入相同.
pub fn validate_and_trim(volume: &SegVolume, required: &[&str], force: bool) -> SegResult<SegVolume> {
    let registry = volume.registry()?;
    if !force {
        if let Some(seg) = registry.iter().rev().find(|s| !required.contains(&s.name.as_str())) {
            return Err(SegError::UnexpectedLabel(seg.name.clone()));
        }
    }

    let mut current = volume.clone();
    let mut seen = vec![false; required.len()];
    // 从后往前删除, 这样尚未访问的 segment 的序位不受影响.
    for seg in registry.iter().rev() {
        match required.iter().position(|r| *r == seg.name) {
            Some(i) => seen[i] = true,
            None => {
                warn!("{} is not a required label, force deleting", seg.name);
                current = remove_segment(&current, seg.index)?;
            }
        }
    }

    if let Some(i) = seen.iter().position(|s| !s) {
        return Err(SegError::MissingLabel(required[i].to_string()));
    }
    registry::check_no_duplicate_names(current.header())?;

    let trimmed = current.registry()?;
    let names = trimmed.names();
    for (expected, label) in required.iter().enumerate() {
        if names.get(expected) != Some(label) {
            return Err(SegError::OutOfOrder {
                label: label.to_string(),
                expected,
                found: names.iter().position(|n| n == label),
            });
        }
    }
    Ok(current)
}

/// 检查 `labels` 是否都出现在 segment 名称中. 否则返回 `Err(SegError::MissingLabels)`,
/// 按 `labels` 的顺序列出所有缺失的标签.
pub fn require_labels(volume: &SegVolume, labels: &[&str]) -> SegResult<()> {
    let registry = volume.registry()?;
    let missing: Vec<String> = labels
        .iter()
        .filter(|l| registry.by_name(l).is_none())
        .map(|l| l.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SegError::MissingLabels(missing))
    }
}

/// 完整的修正流程: 校验并修剪 `required`, 追加 `color_map` 中的扩展标签,
/// 最后确认全部标签齐全且没有重名.
///
/// 第一个失败的步骤决定返回的错误.
pub fn correct_labels(
    volume: &SegVolume,
    required: &[&str],
    color_map: &[(&str, [f64; 3])],
    force: bool,
) -> SegResult<(SegVolume, Vec<AddStatus>)> {
    let trimmed = validate_and_trim(volume, required, force)?;
    let (extended, statuses) = add_segments(&trimmed, color_map)?;

    let all: Vec<&str> = required
        .iter()
        .copied()
        .chain(color_map.iter().map(|(name, _)| *name))
        .collect();
    require_labels(&extended, &all)?;
    registry::check_no_duplicate_names(extended.header())?;
    Ok((extended, statuses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    const REQUIRED: [&str; 3] = ["A", "B", "C"];

    #[test]
    fn test_valid_volume_unchanged() {
        let v = testkit::volume(&REQUIRED);
        assert_eq!(validate_and_trim(&v, &REQUIRED, false).unwrap(), v);
        assert_eq!(validate_and_trim(&v, &REQUIRED, true).unwrap(), v);
    }

    #[test]
    fn test_unexpected_label() {
        let v = testkit::volume(&["A", "B", "X", "C"]);
        assert_eq!(
            validate_and_trim(&v, &REQUIRED, false),
            Err(SegError::UnexpectedLabel("X".to_string()))
        );

        let out = validate_and_trim(&v, &REQUIRED, true).unwrap();
        assert_eq!(out.registry().unwrap().names(), REQUIRED);
        assert_eq!(out.channels().len(), 3);
        assert_eq!(out.header().sizes().unwrap()[0], 3);
        // C 原本在通道 3.
        assert_eq!(out.channels().count(2), 4);
    }

    #[test]
    fn test_unexpected_label_reports_highest_index() {
        let v = testkit::volume(&["A", "X", "B", "Y", "C"]);
        assert_eq!(
            validate_and_trim(&v, &REQUIRED, false),
            Err(SegError::UnexpectedLabel("Y".to_string()))
        );

        let out = validate_and_trim(&v, &REQUIRED, true).unwrap();
        assert_eq!(out.registry().unwrap().names(), REQUIRED);
        assert_eq!(out.header().sizes().unwrap()[0], 3);
        // A, B, C 原本在通道 0, 2, 4.
        assert_eq!(out.channels().count(1), 3);
        assert_eq!(out.channels().count(2), 5);
    }

    #[test]
    fn test_missing_label() {
        let v = testkit::volume(&["A", "C"]);
        assert_eq!(
            validate_and_trim(&v, &REQUIRED, false),
            Err(SegError::MissingLabel("B".to_string()))
        );
    }

    #[test]
    fn test_out_of_order() {
        let v = testkit::volume(&["B", "A", "C"]);
        let e = validate_and_trim(&v, &REQUIRED, true).unwrap_err();
        assert_eq!(
            e,
            SegError::OutOfOrder {
                label: "A".to_string(),
                expected: 0,
                found: Some(1)
            }
        );
        assert!(!e.is_fatal());
    }

    #[test]
    fn test_duplicate_required() {
        let v = testkit::volume(&["A", "B", "C", "A"]);
        assert_eq!(
            validate_and_trim(&v, &REQUIRED, false),
            Err(SegError::DuplicateNames(vec!["A".to_string()]))
        );
    }

    #[test]
    fn test_require_labels() {
        let v = testkit::volume(&["A", "C"]);
        assert_eq!(require_labels(&v, &["A", "C"]), Ok(()));
        assert_eq!(
            require_labels(&v, &["A", "B", "C", "D"]),
            Err(SegError::MissingLabels(vec!["B".to_string(), "D".to_string()]))
        );
    }

    #[test]
    fn test_correct_labels() {
        let map = [("R", [1.0, 0.0, 0.0]), ("S", [0.0, 1.0, 0.0])];
        let v = testkit::volume(&["A", "X", "B", "C"]);
        let (out, statuses) = correct_labels(&v, &REQUIRED, &map, true).unwrap();
        assert_eq!(out.registry().unwrap().names(), ["A", "B", "C", "R", "S"]);
        assert_eq!(statuses, [AddStatus::Added(4), AddStatus::Added(5)]);

        // 以完整标签集为 required 再次修正, 结果不变.
        let all = ["A", "B", "C", "R", "S"];
        let (again, statuses) = correct_labels(&out, &all, &map, false).unwrap();
        assert_eq!(again, out);
        assert_eq!(statuses, [AddStatus::Skipped, AddStatus::Skipped]);
    }

    #[test]
    fn test_correct_labels_without_force() {
        let map = [("R", [1.0, 0.0, 0.0])];
        let v = testkit::volume(&["A", "B", "C", "R"]);
        // R 不在 required 中.
        assert_eq!(
            correct_labels(&v, &REQUIRED, &map, false),
            Err(SegError::UnexpectedLabel("R".to_string()))
        );
    }
}
