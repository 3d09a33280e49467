use log::{debug, warn};

use super::SegVolume;
use crate::color::{self, Rgb};
use crate::consts::keys::*;
use crate::error::SegError;
use crate::extent::Extent;
use crate::header::{segment_index, segment_key, HeaderValue};
use crate::registry;
use crate::SegResult;

/// 追加 segment 的结果.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AddStatus {
    /// 已追加, 携带新 segment 的索引.
    Added(usize),

    /// 同名 segment 已存在, 未做任何修改.
    Skipped,
}

impl AddStatus {
    /// 是否真正追加了 segment.
    #[inline]
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added(_))
    }
}

/// 生成新 segment 的 header 字段, 顺序与 3D Slicer 写出的一致.
pub fn new_segment_fields(index: usize, name: &str, color: &str) -> Vec<(String, HeaderValue)> {
    [
        (COLOR, color.to_string()),
        (COLOR_AUTO_GENERATED, "0".to_string()),
        (EXTENT, Extent::UNDEFINED.to_string()),
        (ID, format!("Segment_{}", index + 1)),
        (NAME, name.to_string()),
        (NAME_AUTO_GENERATED, "0".to_string()),
    ]
    .into_iter()
    .map(|(field, v)| (segment_key(index, field), HeaderValue::Text(v)))
    .collect()
}

/// 追加一个名为 `name`、颜色为 `color` (`[0, 1]` 浮点 RGB) 的空 segment.
///
/// 新通道全零, 追加在通道数组末尾; 新的 header 块插入在最后一个 segment 块之后
/// (而不是 header 末尾), 其余键的相对顺序不变. `sizes` 同步更新.
///
/// # 返回值
///
/// - `name` 为空时返回 `Err(SegError::EmptyName)`;
/// - `color` 不在 `[0, 1]` 内时返回 `Err(SegError::BadColorFormat)`;
/// - 同名 segment 已存在且 `resuming == false` 时, 原样返回副本和 [`AddStatus::Skipped`];
/// - 同名 segment 已存在且 `resuming == true` (本批次已有追加成功) 时, 返回
///   `Err(SegError::OutOfOrderDuplicate)`;
/// - 否则返回新的 `SegVolume` 和 [`AddStatus::Added`].
pub fn add_segment(
    volume: &SegVolume,
    name: &str,
    color: [f64; 3],
    resuming: bool,
) -> SegResult<(SegVolume, AddStatus)> {
    if name.is_empty() {
        return Err(SegError::EmptyName);
    }
    Rgb::from_unit(color)?;

    let header = volume.header();
    if registry::find_by_name(header, name).is_some() {
        if resuming {
            return Err(SegError::OutOfOrderDuplicate(name.to_string()));
        }
        warn!("{name} already exists, skipping");
        return Ok((volume.clone(), AddStatus::Skipped));
    }

    let last = registry::find_last_index(header).map(|(index, _)| index);
    let next = last.map_or(0, |i| i + 1);

    // 紧跟在最后一个 segment 块的最后一个键之后.
    let at = last
        .and_then(|i| {
            header
                .keys()
                .enumerate()
                .filter(|(_, k)| segment_index(k) == Some(i))
                .map(|(pos, _)| pos + 1)
                .last()
        })
        .unwrap_or(header.len());

    let mut new_header = header.clone();
    new_header.splice_at(at, new_segment_fields(next, name, &color::format_unit(color)))?;
    let channels = volume.channels().with_empty_channel();
    new_header.set_sizes(channels.shape());

    let ans = SegVolume::new(new_header, channels)?;
    debug!("Added {name} as Segment{next}, shape {:?}", ans.channels().shape());
    Ok((ans, AddStatus::Added(next)))
}

/// 依次追加 `color_map` 中的所有 segment.
///
/// 第一次追加成功后, 后续调用都以 `resuming == true` 进行: 此后再遇到已存在的名称,
/// 说明 header 不处于期望的尾部追加状态, 返回 `Err(SegError::OutOfOrderDuplicate)`.
/// 出错时不返回任何部分结果.
pub fn add_segments(
    volume: &SegVolume,
    color_map: &[(&str, [f64; 3])],
) -> SegResult<(SegVolume, Vec<AddStatus>)> {
    let mut current = volume.clone();
    let mut statuses = Vec::with_capacity(color_map.len());
    let mut resuming = false;
    for (name, color) in color_map {
        let (next, status) = add_segment(&current, name, *color, resuming)?;
        resuming |= status.is_added();
        statuses.push(status);
        current = next;
    }
    Ok((current, statuses))
}
