#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 维护 OCT 视网膜分割文件 (3D Slicer 导出的 `.seg.nrrd`) 中
//! header 与多通道掩膜数组之间的同步关系.
//!
//! 一个 seg.nrrd 文件由有序的 header 和 `[segments, x, y, z]` 形状的 `u8` 数组组成.
//! 每个 segment 在 header 中对应一组 `Segment<N>_<Field>` 键, 在数组中对应一个通道.
//! 本 crate 的所有变更操作都同时更新两者, 并保证:
//!
//! 1. 按索引升序枚举 segment 时, 第 `i` 个 segment 对应第 `i` 个通道;
//! 2. `sizes` 总是等于数组形状;
//! 3. segment 块在 header 中按索引升序连续排列.
//!
//! # 注意
//!
//! 1. 删除 segment 时不重新编号, 因此索引可能不连续. 通道位置永远由升序枚举得到,
//!   而不是由索引直接得到. 详见 [`registry`].
//! 2. 所有操作都以共享引用为输入并返回新的 [`SegVolume`], 失败时输入不变.
//!
//! # 开发计划
//!
//! ### header 有序存储与 segment 注册表 ✅
//!
//! 实现位于 `oct-berry/src/header` 和 `oct-berry/src/registry.rs`.
//!
//! ### 追加 / 删除 / 校验修剪 ✅
//!
//! 包括批量追加扩展标签时的 "续写" 检查, 以及按序位删除通道.
//!
//! 实现位于 `oct-berry/src/engine`.
//!
//! ### 清空标签, 删除 z 切片, x/y 裁剪, 重新编号 ✅
//!
//! 实现位于 `oct-berry/src/engine/edit.rs`.
//!
//! ### 颜色编解码与彩色叠加图 ✅
//!
//! 实现位于 `oct-berry/src/color.rs` 和 `oct-berry/src/overlay.rs`.
//!
//! ### seg.nrrd 读写 ✅
//!
//! 只支持 `uint8`, `raw`/`gzip`, 数据附在 header 之后.
//!
//! 实现位于 `oct-berry/src/nrrd.rs`.
//!
//! ### 其他编码 (`bzip2`) 与分离数据文件 ⌛️

pub mod channel;
pub mod color;
pub mod consts;
pub mod engine;
pub mod error;
pub mod extent;
pub mod header;
pub mod nrrd;
pub mod overlay;
pub mod prelude;
pub mod registry;

pub use channel::{ChannelArray, CropMargins};
pub use color::Rgb;
pub use engine::SegVolume;
pub use error::{SegError, Severity};
pub use extent::Extent;
pub use header::{HeaderStore, HeaderValue};
pub use nrrd::NrrdError;
pub use registry::{Segment, SegmentRegistry};

/// 本 crate 的通用返回类型.
pub type SegResult<T> = Result<T, SegError>;

/// 测试用的合成数据.
#[cfg(test)]
pub(crate) mod testkit {
    use crate::channel::ChannelArray;
    use crate::engine::{new_segment_fields, SegVolume};
    use crate::header::{HeaderStore, HeaderValue};

    /// 位于所有 segment 块之后的卷级别键.
    pub const TRAILING_KEY: &str = "Segmentation_ReferenceImageExtentOffset";

    /// 打开调试日志. 多个测试重复调用时忽略后续的初始化错误.
    pub fn init_logger() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    }

    /// 按名称依次生成 `Segment0`, `Segment1`, ...
    pub fn volume(names: &[&str]) -> SegVolume {
        let indexed: Vec<(usize, &str)> = names.iter().copied().enumerate().collect();
        volume_with_indices(&indexed)
    }

    /// 生成空间形状为 `[4, 3, 2]` 的文件. 序位为 `p` 的通道中,
    /// 按逻辑顺序的前 `p + 1` 个体素为 1, 以便在删除后辨认通道.
    pub fn volume_with_indices(segments: &[(usize, &str)]) -> SegVolume {
        let mut header = HeaderStore::new();
        header.insert("type", "uint8");
        header.insert("dimension", "4");
        header.insert("space", "right-anterior-superior");
        header.set_sizes(&[segments.len(), 4, 3, 2]);
        header.insert("space directions", "none (1,0,0) (0,1,0) (0,0,1)");
        header.insert("kinds", "list domain domain domain");
        header.insert("encoding", "gzip");
        header.insert("space origin", HeaderValue::FloatTriple([0.5, 1.0, -2.0]));
        header.insert("Segmentation_MasterRepresentation", "Binary labelmap");
        for (index, name) in segments {
            let at = header.len();
            header
                .splice_at(at, new_segment_fields(*index, name, "0.5 0.5 0.5"))
                .unwrap();
        }
        header.insert(TRAILING_KEY, "0 0 0");

        let mut channels = ChannelArray::zeros(segments.len(), &[4, 3, 2]);
        for p in 0..segments.len() {
            channels
                .channel_mut(p)
                .iter_mut()
                .take(p + 1)
                .for_each(|v| *v = 1);
        }
        SegVolume::new(header, channels).unwrap()
    }
}
