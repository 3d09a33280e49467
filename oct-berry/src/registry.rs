//! segment 注册表.
//!
//! header 是扁平的键值存储, segment 的结构只能通过 `Segment<N>_<Field>`
//! 形式的键恢复. 注册表在每次操作开始时由 header 构建一次,
//! 之后所有查询都基于它, 而不是反复扫描 header.
//!
//! # 序位与索引
//!
//! segment 的 **索引** 是其键的数字后缀 `N`, **序位** 是它在按索引升序枚举时的位置.
//! 通道数组中的通道位置永远等于序位. 删除 segment 时不会重新编号 (见
//! [`crate::engine::delete_segment_by_name`]), 因此两者可能不同.

use itertools::Itertools;
use std::collections::BTreeMap;

use crate::color::{self, Rgb};
use crate::consts::keys::{COLOR, EXTENT, ID, NAME};
use crate::error::SegError;
use crate::extent::Extent;
use crate::header::{HeaderStore, HeaderValue, SegmentKey};
use crate::SegResult;

/// 一个带名称和颜色的标签通道.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    /// header 键的数字后缀.
    pub index: usize,

    /// 在升序枚举中的序位, 即通道数组中的通道位置.
    pub position: usize,

    /// 名称.
    pub name: String,

    /// 8-bit 显示颜色.
    pub color: Rgb,

    /// 空间范围.
    pub extent: Extent,

    /// 3D Slicer 标识符. 仅用于展示, 不携带顺序信息.
    pub id: Option<String>,
}

/// 单个 segment 在 header 中出现的字段.
#[derive(Default)]
struct RawFields<'a> {
    name: Option<&'a str>,
    color: Option<&'a str>,
    extent: Option<&'a str>,
    id: Option<&'a str>,
}

/// 将字段值解释为文本. 非文本说明 header 已损坏.
fn text_of<'a>(key: SegmentKey<'_>, v: &'a HeaderValue) -> SegResult<&'a str> {
    v.as_text()
        .ok_or_else(|| SegError::MalformedHeader(format!("`{key}` is not a text value")))
}

/// 由 header 构建的 segment 注册表, 按索引升序排列.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentRegistry {
    segments: Vec<Segment>,
}

impl SegmentRegistry {
    /// 从 `header` 构建注册表.
    ///
    /// 1. 某个 segment 缺少 `Name` 或 `Color` 字段时返回 `Err(SegError::MalformedHeader)`;
    /// 2. 颜色无法解析时返回 `Err(SegError::BadColorFormat)`;
    /// 3. `Extent` 缺失时视为 [`Extent::UNDEFINED`], 存在但无法解析时返回
    ///   `Err(SegError::MalformedHeader)`.
    pub fn build(header: &HeaderStore) -> SegResult<Self> {
        let mut groups: BTreeMap<usize, RawFields> = BTreeMap::new();
        for (key, value) in header.segment_entries() {
            let slot = groups.entry(key.index).or_default();
            match key.field {
                NAME => slot.name = Some(text_of(key, value)?),
                COLOR => slot.color = Some(text_of(key, value)?),
                EXTENT => slot.extent = Some(text_of(key, value)?),
                ID => slot.id = Some(text_of(key, value)?),
                _ => {}
            }
        }

        let mut segments = Vec::with_capacity(groups.len());
        for (position, (index, raw)) in groups.into_iter().enumerate() {
            let missing =
                |field: &str| SegError::MalformedHeader(format!("Segment{index} has no `{field}`"));
            let name = raw.name.ok_or_else(|| missing(NAME))?;
            let color = color::decode_one(raw.color.ok_or_else(|| missing(COLOR))?)?;
            let extent = match raw.extent {
                None => Extent::UNDEFINED,
                Some(text) => text.parse().map_err(|_| {
                    SegError::MalformedHeader(format!("Segment{index} has bad extent `{text}`"))
                })?,
            };
            segments.push(Segment {
                index,
                position,
                name: name.to_string(),
                color,
                extent,
                id: raw.id.map(str::to_string),
            });
        }
        Ok(Self { segments })
    }

    /// segment 个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// 是否没有任何 segment.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 按索引升序迭代.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// 消费自我, 获得按索引升序排列的 segments.
    #[inline]
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    /// 按名称查找第一个匹配的 segment.
    #[inline]
    pub fn by_name(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// 按索引 (键后缀) 查找 segment.
    #[inline]
    pub fn by_index(&self, index: usize) -> Option<&Segment> {
        self.segments
            .binary_search_by_key(&index, |s| s.index)
            .ok()
            .map(|pos| &self.segments[pos])
    }

    /// 索引最大的 segment.
    #[inline]
    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// 按索引升序获取所有名称.
    pub fn names(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.name.as_str()).collect()
    }
}

/// 按索引升序列出 `header` 中的所有 segment. 错误条件同 [`SegmentRegistry::build`].
#[inline]
pub fn list_segments(header: &HeaderStore) -> SegResult<Vec<Segment>> {
    SegmentRegistry::build(header).map(SegmentRegistry::into_segments)
}

/// 查找第一个 `Name` 字段等于 `name` 的 segment 索引.
///
/// 该函数不检查名称唯一性, 唯一性由 [`check_no_duplicate_names`] 负责.
pub fn find_by_name(header: &HeaderStore, name: &str) -> Option<usize> {
    header
        .segment_entries()
        .find(|(k, v)| k.field == NAME && v.as_text() == Some(name))
        .map(|(k, _)| k.index)
}

/// 查找最大的 segment 索引及其首次出现的键. 不存在 segment 键时返回 `None`.
pub fn find_last_index(header: &HeaderStore) -> Option<(usize, String)> {
    let mut ans: Option<(usize, SegmentKey)> = None;
    for (k, _) in header.segment_entries() {
        if ans.map_or(true, |(last, _)| k.index > last) {
            ans = Some((k.index, k));
        }
    }
    ans.map(|(index, k)| (index, k.to_string()))
}

/// 统计 `header` 中不同 `Segment<N>` 前缀的个数.
#[inline]
pub fn segment_count(header: &HeaderStore) -> usize {
    header.segment_entries().map(|(k, _)| k.index).unique().count()
}

/// 检查 segment 名称是否重复. 若有重复, 返回 `Err(SegError::DuplicateNames)`,
/// 其中每个重复名称只出现一次.
pub fn check_no_duplicate_names(header: &HeaderStore) -> SegResult<()> {
    let dup: Vec<String> = header
        .segment_entries()
        .filter(|(k, _)| k.field == NAME)
        .filter_map(|(_, v)| v.as_text())
        .duplicates()
        .map(str::to_string)
        .collect();
    if dup.is_empty() {
        Ok(())
    } else {
        Err(SegError::DuplicateNames(dup))
    }
}

/// 检查 segment 块的排布: 每个 segment 的键必须连续成块, 且各块按索引升序出现.
///
/// 违反时返回 `Err(SegError::MalformedHeader)`.
pub fn check_block_order(header: &HeaderStore) -> SegResult<()> {
    let mut current: Option<usize> = None;
    let mut closed = Vec::new();
    for (k, _) in header.segment_entries() {
        match current {
            Some(c) if c == k.index => continue,
            Some(c) if k.index < c || closed.contains(&k.index) => {
                return Err(SegError::MalformedHeader(format!(
                    "`{k}` appears after the block of Segment{c}"
                )));
            }
            Some(c) => closed.push(c),
            None => {}
        }
        current = Some(k.index);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(h: &mut HeaderStore, index: usize, name: &str) {
        h.insert(format!("Segment{index}_Color"), "0.5 0.5 0.5");
        h.insert(format!("Segment{index}_Extent"), "0 3 0 3 0 1");
        h.insert(format!("Segment{index}_ID"), format!("Segment_{}", index + 1));
        h.insert(format!("Segment{index}_Name"), name);
    }

    fn header_with(names: &[(usize, &str)]) -> HeaderStore {
        let mut h = HeaderStore::new();
        h.set_sizes(&[names.len(), 4, 4, 2]);
        for (index, name) in names {
            block(&mut h, *index, name);
        }
        h.insert("Segmentation_ContainedRepresentationNames", "Binary labelmap|");
        h
    }

    #[test]
    fn test_list_segments() {
        let h = header_with(&[(0, "A"), (1, "B"), (3, "C")]);
        let segs = list_segments(&h).unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[2].name, "C");
        assert_eq!(segs[2].index, 3);
        assert_eq!(segs[2].position, 2);
        assert_eq!(segs[0].color, Rgb([128, 128, 128]));
        assert_eq!(segs[1].id.as_deref(), Some("Segment_2"));
        assert_eq!(segs[0].extent, Extent([0, 3, 0, 3, 0, 1]));
    }

    #[test]
    fn test_list_segments_natural_index_order() {
        let h = header_with(&[(2, "B"), (10, "C")]);
        let names: Vec<_> = list_segments(&h).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["B", "C"]);
    }

    #[test]
    fn test_missing_fields() {
        let mut h = header_with(&[(0, "A")]);
        h.remove("Segment0_Color");
        assert!(matches!(list_segments(&h), Err(SegError::MalformedHeader(_))));

        let mut h = header_with(&[(0, "A")]);
        h.remove("Segment0_Name");
        assert!(matches!(list_segments(&h), Err(SegError::MalformedHeader(_))));

        let mut h = header_with(&[(0, "A")]);
        h.remove("Segment0_Extent");
        assert_eq!(list_segments(&h).unwrap()[0].extent, Extent::UNDEFINED);
    }

    #[test]
    fn test_find() {
        let h = header_with(&[(0, "A"), (1, "B"), (5, "C")]);
        assert_eq!(find_by_name(&h, "C"), Some(5));
        assert_eq!(find_by_name(&h, "X"), None);
        assert_eq!(find_last_index(&h), Some((5, "Segment5_Color".to_string())));
        assert_eq!(find_last_index(&HeaderStore::new()), None);
        assert_eq!(segment_count(&h), 3);

        let reg = SegmentRegistry::build(&h).unwrap();
        assert_eq!(reg.by_index(5).map(|s| s.position), Some(2));
        assert_eq!(reg.by_index(4), None);
        assert_eq!(reg.by_name("B").map(|s| s.index), Some(1));
        assert_eq!(reg.last().map(|s| s.name.as_str()), Some("C"));
        assert_eq!(reg.names(), ["A", "B", "C"]);
    }

    #[test]
    fn test_duplicate_names() {
        let h = header_with(&[(0, "A"), (1, "B")]);
        assert_eq!(check_no_duplicate_names(&h), Ok(()));

        let h = header_with(&[(0, "A"), (1, "B"), (2, "A"), (3, "A")]);
        assert_eq!(
            check_no_duplicate_names(&h),
            Err(SegError::DuplicateNames(vec!["A".to_string()]))
        );
    }

    #[test]
    fn test_block_order() {
        let h = header_with(&[(0, "A"), (1, "B"), (4, "C")]);
        assert_eq!(check_block_order(&h), Ok(()));

        let h = header_with(&[(1, "B"), (0, "A")]);
        assert!(check_block_order(&h).is_err());

        // 块被拆开.
        let mut h = header_with(&[(0, "A"), (1, "B")]);
        h.insert("Segment0_NameAutoGenerated", "0");
        assert!(check_block_order(&h).is_err());
    }
}
