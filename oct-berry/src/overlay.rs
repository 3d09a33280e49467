//! 彩色叠加图与未标注体素检查.

use image::{Rgb as Pixel, RgbImage};
use ndarray::Axis;

use crate::channel::ChannelArray;
use crate::color::Rgb;
use crate::error::SegError;
use crate::SegResult;

/// 单个 z 切片上没有任何通道标注的体素.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnlabeledSlice {
    /// 切片索引.
    pub z: usize,

    /// 未标注体素个数, 等于 `locations.len()`.
    pub count: usize,

    /// 未标注体素的 `(x, y)` 坐标, 按 x 再按 y 升序.
    pub locations: Vec<(usize, usize)>,
}

/// 找出所有含未标注体素的 z 切片. 全部标注的切片不出现在结果中.
///
/// 空间轴不是三个时返回 `Err(SegError::Dimensionality)`.
pub fn unlabeled_voxels(channels: &ChannelArray) -> SegResult<Vec<UnlabeledSlice>> {
    channels.require_3d()?;
    let empty = channels
        .data()
        .map_axis(Axis(0), |lane| lane.iter().all(|v| *v == 0));

    let mut ans = Vec::new();
    for (z, plane) in empty.axis_iter(Axis(2)).enumerate() {
        let locations: Vec<(usize, usize)> = plane
            .indexed_iter()
            .filter(|(_, e)| **e)
            .map(|(idx, _)| (idx[0], idx[1]))
            .collect();
        if !locations.is_empty() {
            ans.push(UnlabeledSlice {
                z,
                count: locations.len(),
                locations,
            });
        }
    }
    Ok(ans)
}

/// 将第 `z` 个切片上的所有通道按 `colors` 叠加为一幅 RGB 图像, 宽为 x, 高为 y.
///
/// 每个非零体素贡献其通道颜色, 重叠处逐分量饱和相加.
///
/// 1. 空间轴不是三个时返回 `Err(SegError::Dimensionality)`;
/// 2. `z` 越界时返回 `Err(SegError::SliceOutOfRange)`;
/// 3. 颜色个数与通道个数不同时返回 `Err(SegError::MalformedHeader)`.
pub fn overlay_slice(channels: &ChannelArray, colors: &[Rgb], z: usize) -> SegResult<RgbImage> {
    let &[_, w, h, depth] = channels.shape() else {
        return Err(SegError::Dimensionality {
            expected: 3,
            found: channels.spatial_shape().len(),
        });
    };
    if z >= depth {
        return Err(SegError::SliceOutOfRange { index: z, len: depth });
    }
    if colors.len() != channels.len() {
        return Err(SegError::MalformedHeader(format!(
            "{} colors for {} channels",
            colors.len(),
            channels.len()
        )));
    }

    let mut img = RgbImage::new(w as u32, h as u32);
    for (position, color) in colors.iter().enumerate() {
        let channel = channels.channel(position);
        let plane = channel.index_axis(Axis(2), z);
        for (idx, _) in plane.indexed_iter().filter(|(_, v)| **v != 0) {
            let Pixel(px) = img.get_pixel_mut(idx[0] as u32, idx[1] as u32);
            for (p, c) in px.iter_mut().zip(color.0) {
                *p = p.saturating_add(c);
            }
        }
    }
    Ok(img)
}
