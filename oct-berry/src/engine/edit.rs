use log::{debug, info};
use std::collections::HashMap;

use super::SegVolume;
use crate::channel::CropMargins;
use crate::consts::keys::EXTENT;
use crate::error::SegError;
use crate::extent::Extent;
use crate::header::{segment_key, HeaderStore, SegmentKey};
use crate::SegResult;

/// 清空名为 `name` 的 segment 的通道数据, 保留其 header 块; `Extent` 置为哨兵值.
///
/// 不存在该名称时返回 `Err(SegError::NotFound)`.
pub fn clear_segment_data(volume: &SegVolume, name: &str) -> SegResult<SegVolume> {
    let registry = volume.registry()?;
    let seg = registry
        .by_name(name)
        .ok_or_else(|| SegError::NotFound(name.to_string()))?;
    debug!("Clearing {name} (channel {})", seg.position);

    let channels = volume.channels().with_cleared_channel(seg.position);
    let mut header = volume.header().clone();
    let key = segment_key(seg.index, EXTENT);
    if header.contains_key(&key) {
        header.insert(key, Extent::UNDEFINED.to_string());
    }
    SegVolume::new(header, channels)
}

/// 沿最后一个空间轴去掉第 `z` 个切片. `sizes` 同步更新, `space origin` 重置为原点.
///
/// 错误条件同 [`ChannelArray::without_slice`](crate::channel::ChannelArray::without_slice).
pub fn remove_slice(volume: &SegVolume, z: usize) -> SegResult<SegVolume> {
    let channels = volume.channels().without_slice(z)?;
    info!(
        "Removing slice {z}: {:?} -> {:?}",
        volume.channels().shape(),
        channels.shape()
    );
    let mut header = volume.header().clone();
    header.set_sizes(channels.shape());
    header.reset_space_origin();
    SegVolume::new(header, channels)
}

/// 在 x/y 方向裁剪. `sizes` 同步更新, `space origin` 重置为原点, 所有 `Extent` 按裁剪后的数据重算.
///
/// 错误条件同 [`ChannelArray::cropped_xy`](crate::channel::ChannelArray::cropped_xy).
pub fn crop_xy(volume: &SegVolume, margins: &CropMargins) -> SegResult<SegVolume> {
    let channels = volume.channels().cropped_xy(margins)?;
    info!(
        "Cropping {margins:?}: {:?} -> {:?}",
        volume.channels().shape(),
        channels.shape()
    );
    let mut header = volume.header().clone();
    header.set_sizes(channels.shape());
    header.reset_space_origin();
    refresh_extents(&SegVolume::new(header, channels)?)
}

/// 按通道数据重写每个已有的 `Segment<N>_Extent`. 没有 `Extent` 键的 segment 不会新增该键.
///
/// 空间轴不是三个时返回 `Err(SegError::Dimensionality)`.
pub fn refresh_extents(volume: &SegVolume) -> SegResult<SegVolume> {
    #[cfg(feature = "rayon")]
    let extents = volume.channels().par_extents()?;
    #[cfg(not(feature = "rayon"))]
    let extents = volume.channels().extents()?;

    let mut header = volume.header().clone();
    for seg in volume.registry()?.iter() {
        let key = segment_key(seg.index, EXTENT);
        if header.contains_key(&key) {
            header.insert(key, extents[seg.position].to_string());
        }
    }
    SegVolume::new(header, volume.channels().clone())
}

/// 将每个 `Segment<N>_` 前缀改写为 `Segment<序位>_`, 使键后缀与通道位置重新一致.
///
/// 键的顺序和值均不变 (`ID` 也不变). 编号已经连续时返回与输入相同的结果.
pub fn renumber_segments(volume: &SegVolume) -> SegResult<SegVolume> {
    let mapping: HashMap<usize, usize> = volume
        .registry()?
        .iter()
        .map(|s| (s.index, s.position))
        .collect();
    let header: HeaderStore = volume
        .header()
        .iter()
        .map(|(k, v)| {
            let key = match SegmentKey::parse(k) {
                Some(sk) if mapping[&sk.index] != sk.index => {
                    segment_key(mapping[&sk.index], sk.field)
                }
                _ => k.to_string(),
            };
            (key, v.clone())
        })
        .collect();
    SegVolume::new(header, volume.channels().clone())
}
