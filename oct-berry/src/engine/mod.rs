//! 变更引擎.
//!
//! 所有操作都以 `&SegVolume` 为输入, 在副本上计算新的 header 和通道数组,
//! 校验一致性后才返回新的 [`SegVolume`]; 失败时输入保持不变.
//!
//! 同一文件上的多次调用必须严格串行, 因为每次调用都依赖上一次的输出
//! (见 [`add_segments`] 中的 `resuming` 状态).

use crate::channel::ChannelArray;
use crate::error::SegError;
use crate::header::HeaderStore;
use crate::registry::{self, Segment, SegmentRegistry};
use crate::SegResult;

mod add;
mod delete;
mod edit;
mod validate;

pub use add::{add_segment, add_segments, new_segment_fields, AddStatus};
pub use delete::{delete_segment_by_name, DeletePolicy};
pub use edit::{clear_segment_data, crop_xy, refresh_extents, remove_slice, renumber_segments};
pub use validate::{correct_labels, require_labels, validate_and_trim};

/// 一个 seg.nrrd 文件的 header 与通道数组. 两者作为整体加载、变更和持久化.
///
/// 该结构总是满足:
///
/// 1. `sizes == channels.shape()`;
/// 2. 不同 `Segment<N>` 前缀的个数等于通道个数;
/// 3. segment 键按块连续, 各块按索引升序排列.
#[derive(Clone, Debug, PartialEq)]
pub struct SegVolume {
    header: HeaderStore,
    channels: ChannelArray,
}

impl SegVolume {
    /// 组合 header 与通道数组, 并检查一致性. 不一致时返回的错误均为致命错误.
    pub fn new(header: HeaderStore, channels: ChannelArray) -> SegResult<Self> {
        let ans = Self { header, channels };
        ans.check_consistency()?;
        Ok(ans)
    }

    /// 获取 header.
    #[inline]
    pub fn header(&self) -> &HeaderStore {
        &self.header
    }

    /// 获取通道数组.
    #[inline]
    pub fn channels(&self) -> &ChannelArray {
        &self.channels
    }

    /// 消费自我, 获得 header 与通道数组.
    #[inline]
    pub fn into_parts(self) -> (HeaderStore, ChannelArray) {
        (self.header, self.channels)
    }

    /// 由 header 构建 segment 注册表.
    #[inline]
    pub fn registry(&self) -> SegResult<SegmentRegistry> {
        SegmentRegistry::build(&self.header)
    }

    /// 按索引升序列出所有 segment.
    #[inline]
    pub fn segments(&self) -> SegResult<Vec<Segment>> {
        registry::list_segments(&self.header)
    }

    /// 检查 header 与通道数组的一致性.
    ///
    /// 1. `sizes` 与数组形状不符时返回 `Err(SegError::ShapeMismatch)`;
    /// 2. segment 块个数与通道数不符, 或块排布错乱时返回 `Err(SegError::MalformedHeader)`.
    pub fn check_consistency(&self) -> SegResult<()> {
        let sizes = self.header.sizes()?;
        let shape = self.channels.shape();
        if sizes.len() != shape.len() || sizes.iter().zip(shape).any(|(a, b)| *a != *b as i64) {
            return Err(SegError::ShapeMismatch {
                sizes: sizes.to_vec(),
                shape: shape.to_vec(),
            });
        }
        let blocks = registry::segment_count(&self.header);
        if blocks != self.channels.len() {
            return Err(SegError::MalformedHeader(format!(
                "{blocks} segment blocks for {} channels",
                self.channels.len()
            )));
        }
        registry::check_block_order(&self.header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn test_consistency() {
        let v = testkit::volume(&["A", "B"]);
        assert_eq!(v.check_consistency(), Ok(()));

        let (mut header, channels) = v.clone().into_parts();
        header.set_sizes(&[3, 4, 3, 2]);
        assert!(matches!(
            SegVolume::new(header, channels.clone()),
            Err(SegError::ShapeMismatch { .. })
        ));

        let (mut header, _) = v.into_parts();
        header.remove("sizes");
        assert!(matches!(
            SegVolume::new(header, channels.clone()),
            Err(SegError::MalformedHeader(_))
        ));

        let (mut header, _) = testkit::volume(&["A", "B", "C"]).into_parts();
        header.set_sizes(channels.shape());
        let e = SegVolume::new(header, channels).unwrap_err();
        assert!(e.is_fatal());
    }
}
