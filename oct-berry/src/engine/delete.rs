use log::info;
use std::collections::BTreeSet;

use super::SegVolume;
use crate::consts::{MIN_DELETABLE_INDEX, ORIGINAL_LABELS};
use crate::error::SegError;
use crate::header::segment_index;
use crate::registry;
use crate::SegResult;

/// 删除策略: 哪些名称与索引受保护.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeletePolicy {
    protected_names: BTreeSet<String>,
    min_deletable_index: usize,
}

impl Default for DeletePolicy {
    /// 保护七个原始标签, 且索引小于 [`MIN_DELETABLE_INDEX`] 的 segment 不可删除.
    fn default() -> Self {
        Self::new(ORIGINAL_LABELS, MIN_DELETABLE_INDEX)
    }
}

impl DeletePolicy {
    /// 创建删除策略.
    pub fn new<I, S>(protected_names: I, min_deletable_index: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected_names: protected_names.into_iter().map(Into::into).collect(),
            min_deletable_index,
        }
    }

    /// 不做任何保护.
    #[inline]
    pub fn unrestricted() -> Self {
        Self::new(std::iter::empty::<String>(), 0)
    }

    /// `name` 是否受保护.
    #[inline]
    pub fn protects(&self, name: &str) -> bool {
        self.protected_names.contains(name)
    }

    /// 可删除的最小索引.
    #[inline]
    pub fn min_deletable_index(&self) -> usize {
        self.min_deletable_index
    }
}

/// 删除名为 `name` 的 segment.
///
/// 检查顺序如下, 任一失败都不修改输入:
///
/// 1. `name` 受 `policy` 保护时返回 `Err(SegError::ProtectedLabel)`;
/// 2. 不存在该名称时返回 `Err(SegError::NotFound)`;
/// 3. 其索引小于 `policy.min_deletable_index()` 时返回 `Err(SegError::ProtectedIndex)`.
///
/// 删除后不重新编号: 其余 segment 的键保持原样, 索引可能出现空洞.
/// 通道按注册表序位删除, 而不是按索引. 需要连续编号时调用
/// [`renumber_segments`](super::renumber_segments).
pub fn delete_segment_by_name(
    volume: &SegVolume,
    name: &str,
    policy: &DeletePolicy,
) -> SegResult<SegVolume> {
    if policy.protects(name) {
        return Err(SegError::ProtectedLabel(name.to_string()));
    }
    let index = registry::find_by_name(volume.header(), name)
        .ok_or_else(|| SegError::NotFound(name.to_string()))?;
    if index < policy.min_deletable_index {
        return Err(SegError::ProtectedIndex {
            name: name.to_string(),
            index,
            min: policy.min_deletable_index,
        });
    }
    remove_segment(volume, index)
}

/// 无条件删除索引为 `index` 的 segment 的全部键和对应通道.
pub(super) fn remove_segment(volume: &SegVolume, index: usize) -> SegResult<SegVolume> {
    let registry = volume.registry()?;
    let seg = registry
        .by_index(index)
        .ok_or_else(|| SegError::NotFound(format!("Segment{index}")))?;
    info!(
        "Deleting {} (Segment{index}, channel {})",
        seg.name, seg.position
    );

    // 按解析出的索引过滤, `Segment01_Name` 也属于索引 1.
    let mut header = volume.header().clone();
    header.retain(|k, _| segment_index(k) != Some(index));
    let channels = volume.channels().without_channel(seg.position);
    header.set_sizes(channels.shape());
    SegVolume::new(header, channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::add_segment;
    use crate::header::HeaderStore;
    use crate::testkit;

    fn policy() -> DeletePolicy {
        DeletePolicy::new(["A"], 1)
    }

    #[test]
    fn test_delete() {
        testkit::init_logger();
        let v = testkit::volume(&["A", "B", "C"]);
        let out = delete_segment_by_name(&v, "B", &policy()).unwrap();
        assert_eq!(out.registry().unwrap().names(), ["A", "C"]);
        assert_eq!(out.header().sizes().unwrap(), &[2, 4, 3, 2]);
        assert!(!out.header().keys().any(|k| k.starts_with("Segment1_")));
        // 通道 0 与 2 保留.
        assert_eq!(out.channels().count(0), 1);
        assert_eq!(out.channels().count(1), 3);
        // 不重新编号.
        assert_eq!(out.segments().unwrap()[1].index, 2);
    }

    #[test]
    fn test_delete_errors() {
        let v = testkit::volume(&["A", "B", "C"]);
        assert_eq!(
            delete_segment_by_name(&v, "A", &policy()),
            Err(SegError::ProtectedLabel("A".to_string()))
        );
        assert_eq!(
            delete_segment_by_name(&v, "X", &policy()),
            Err(SegError::NotFound("X".to_string()))
        );
        assert_eq!(
            delete_segment_by_name(&v, "A", &DeletePolicy::new(["Z"], 1)),
            Err(SegError::ProtectedIndex {
                name: "A".to_string(),
                index: 0,
                min: 1
            })
        );
    }

    #[test]
    fn test_default_policy() {
        let names: Vec<&str> = ORIGINAL_LABELS.iter().copied().chain(["RET"]).collect();
        let v = testkit::volume(&names);
        let p = DeletePolicy::default();
        assert_eq!(
            delete_segment_by_name(&v, "RPE", &p),
            Err(SegError::ProtectedLabel("RPE".to_string()))
        );
        let out = delete_segment_by_name(&v, "RET", &p).unwrap();
        assert_eq!(out.channels().len(), 7);
    }

    #[test]
    fn test_delete_with_index_gap() {
        let v = testkit::volume_with_indices(&[(0, "A"), (2, "C"), (5, "F")]);
        let out = delete_segment_by_name(&v, "F", &DeletePolicy::unrestricted()).unwrap();
        assert_eq!(out.registry().unwrap().names(), ["A", "C"]);
        // 删除的是序位 2 的通道, 而不是通道 5.
        assert_eq!(out.channels().count(0), 1);
        assert_eq!(out.channels().count(1), 2);

        let out = delete_segment_by_name(&v, "C", &DeletePolicy::unrestricted()).unwrap();
        assert_eq!(out.channels().count(1), 3);
    }

    #[test]
    fn test_add_then_delete_restores_shape() {
        let v = testkit::volume(&["A", "B", "C"]);
        let (added, _) = add_segment(&v, "N", [1.0, 0.0, 0.0], false).unwrap();
        assert_eq!(added.channels().len(), 4);

        let out = delete_segment_by_name(&added, "N", &policy()).unwrap();
        assert_eq!(out.channels().len(), v.channels().len());
        assert_eq!(out.header().sizes().unwrap()[0], 3);
        assert_eq!(
            registry::segment_count(out.header()),
            registry::segment_count(v.header())
        );
        assert!(out.header().keys().eq(v.header().keys()));
    }

    #[test]
    fn test_delete_zero_padded_keys() {
        let v = testkit::volume(&["A", "B", "C"]);
        let (header, channels) = v.into_parts();
        let header: HeaderStore = header
            .iter()
            .map(|(k, val)| (k.replacen("Segment1_", "Segment01_", 1), val.clone()))
            .collect();
        let v = SegVolume::new(header, channels).unwrap();

        let out = delete_segment_by_name(&v, "B", &policy()).unwrap();
        assert_eq!(out.registry().unwrap().names(), ["A", "C"]);
        assert!(!out.header().keys().any(|k| k.starts_with("Segment01_")));
        assert_eq!(out.channels().count(1), 3);
    }
}
