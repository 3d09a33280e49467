//! 通道数组: 按 segment 序位堆叠的二值 (或标签) 掩膜.

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Axis, IxDyn, Slice};

use crate::error::SegError;
use crate::extent::Extent;
use crate::SegResult;

/// `[segments, *spatial]` 形状的 `u8` 掩膜数组. 第 `i` 个通道对应序位为 `i` 的 segment.
///
/// 所有结构性修改都返回新数组, 不修改 `self`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelArray {
    data: ArrayD<u8>,
}

/// x/y 方向的裁剪量 (体素数).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CropMargins {
    /// 从 x 轴起点去掉的体素数.
    pub left: usize,
    /// 从 x 轴末端去掉的体素数.
    pub right: usize,
    /// 从 y 轴起点去掉的体素数.
    pub up: usize,
    /// 从 y 轴末端去掉的体素数.
    pub down: usize,
}

impl ChannelArray {
    /// 包装已有数组. 第 0 轴为通道轴.
    ///
    /// 数组必须至少有两个轴 (通道轴 + 至少一个空间轴), 否则返回
    /// `Err(SegError::Dimensionality)`.
    pub fn new(data: ArrayD<u8>) -> SegResult<Self> {
        if data.ndim() < 2 {
            return Err(SegError::Dimensionality {
                expected: 3,
                found: data.ndim().saturating_sub(1),
            });
        }
        Ok(Self { data })
    }

    /// 创建 `channels` 个全零通道, 每个通道形状为 `spatial`.
    pub fn zeros(channels: usize, spatial: &[usize]) -> Self {
        let mut shape = Vec::with_capacity(spatial.len() + 1);
        shape.push(channels);
        shape.extend_from_slice(spatial);
        Self {
            data: ArrayD::zeros(IxDyn(&shape)),
        }
    }

    /// 通道个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// 是否没有任何通道.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 完整形状 `[segments, *spatial]`.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// 单个通道的形状.
    #[inline]
    pub fn spatial_shape(&self) -> &[usize] {
        &self.data.shape()[1..]
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayViewD<'_, u8> {
        self.data.view()
    }

    /// 消费自我, 获得底层数组.
    #[inline]
    pub fn into_inner(self) -> ArrayD<u8> {
        self.data
    }

    /// 第 `position` 个通道的不可变视图. 越界时 panic.
    #[inline]
    pub fn channel(&self, position: usize) -> ArrayViewD<'_, u8> {
        self.data.index_axis(Axis(0), position)
    }

    /// 第 `position` 个通道的可变视图. 越界时 panic.
    #[inline]
    pub fn channel_mut(&mut self, position: usize) -> ArrayViewMutD<'_, u8> {
        self.data.index_axis_mut(Axis(0), position)
    }

    /// 第 `position` 个通道的非零体素个数. 越界时 panic.
    #[inline]
    pub fn count(&self, position: usize) -> usize {
        self.channel(position).iter().filter(|v| **v != 0).count()
    }

    /// 在末尾追加一个全零通道, 返回新数组.
    pub fn with_empty_channel(&self) -> Self {
        let n = self.len();
        let mut shape = self.shape().to_vec();
        shape[0] += 1;
        let mut data = ArrayD::zeros(IxDyn(&shape));
        data.slice_axis_mut(Axis(0), Slice::from(..n))
            .assign(&self.data);
        Self { data }
    }

    /// 去掉第 `position` 个通道, 返回新数组. 越界时 panic.
    pub fn without_channel(&self, position: usize) -> Self {
        assert!(position < self.len(), "通道位置越界");
        Self {
            data: self.select_except(Axis(0), position),
        }
    }

    /// 将第 `position` 个通道清零, 返回新数组. 越界时 panic.
    pub fn with_cleared_channel(&self, position: usize) -> Self {
        let mut ans = self.clone();
        ans.channel_mut(position).fill(0);
        ans
    }

    /// 沿 `axis` 去掉第 `index` 个切片.
    fn select_except(&self, axis: Axis, index: usize) -> ArrayD<u8> {
        let keep: Vec<usize> = (0..self.data.len_of(axis)).filter(|&i| i != index).collect();
        self.data.select(axis, &keep)
    }

    /// 要求恰好有三个空间轴 `(x, y, z)`.
    pub(crate) fn require_3d(&self) -> SegResult<()> {
        match self.spatial_shape().len() {
            3 => Ok(()),
            found => Err(SegError::Dimensionality { expected: 3, found }),
        }
    }

    /// 沿最后一个空间轴 (z) 去掉第 `z` 个切片, 返回新数组.
    ///
    /// 1. 空间轴不是三个时返回 `Err(SegError::Dimensionality)`;
    /// 2. `z` 越界时返回 `Err(SegError::SliceOutOfRange)`.
    pub fn without_slice(&self, z: usize) -> SegResult<Self> {
        self.require_3d()?;
        let len = self.data.len_of(Axis(3));
        if z >= len {
            return Err(SegError::SliceOutOfRange { index: z, len });
        }
        Ok(Self {
            data: self.select_except(Axis(3), z),
        })
    }

    /// 在 x/y 方向裁剪, 返回新数组.
    ///
    /// 1. 空间轴不是三个时返回 `Err(SegError::Dimensionality)`;
    /// 2. 某轴的裁剪总量不小于其长度时返回 `Err(SegError::CropTooLarge)`.
    pub fn cropped_xy(&self, m: &CropMargins) -> SegResult<Self> {
        self.require_3d()?;
        let mut view = self.data.view();
        for (axis, lo, hi) in [(Axis(1), m.left, m.right), (Axis(2), m.up, m.down)] {
            let len = view.len_of(axis);
            let margin = lo + hi;
            if margin >= len {
                return Err(SegError::CropTooLarge { margin, len });
            }
            view.slice_axis_inplace(axis, Slice::from(lo..len - hi));
        }
        Ok(Self {
            data: view.to_owned(),
        })
    }

    /// 计算第 `position` 个通道非零体素的包围盒. 通道为空时返回 [`Extent::UNDEFINED`].
    ///
    /// 空间轴不是三个时返回 `Err(SegError::Dimensionality)`. `position` 越界时 panic.
    pub fn extent(&self, position: usize) -> SegResult<Extent> {
        self.require_3d()?;
        let mut bounds: Option<[(usize, usize); 3]> = None;
        for (idx, _) in self
            .channel(position)
            .indexed_iter()
            .filter(|(_, v)| **v != 0)
        {
            let p = [idx[0], idx[1], idx[2]];
            let b = bounds.get_or_insert([(p[0], p[0]), (p[1], p[1]), (p[2], p[2])]);
            for (axis, &v) in b.iter_mut().zip(p.iter()) {
                axis.0 = axis.0.min(v);
                axis.1 = axis.1.max(v);
            }
        }
        Ok(bounds.map_or(Extent::UNDEFINED, Extent::from_bounds))
    }

    /// 按通道位置依次计算所有通道的包围盒.
    pub fn extents(&self) -> SegResult<Vec<Extent>> {
        self.require_3d()?;
        (0..self.len()).map(|p| self.extent(p)).collect()
    }

    /// 按通道位置依次统计所有通道的非零体素个数.
    pub fn counts(&self) -> Vec<usize> {
        (0..self.len()).map(|p| self.count(p)).collect()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl ChannelArray {
    /// 借助 `rayon`, 并行地计算所有通道的包围盒. 结果按通道位置排列.
    pub fn par_extents(&self) -> SegResult<Vec<Extent>> {
        self.require_3d()?;
        (0..self.len())
            .into_par_iter()
            .map(|p| self.extent(p))
            .collect()
    }

    /// 借助 `rayon`, 并行地统计所有通道的非零体素个数. 结果按通道位置排列.
    pub fn par_counts(&self) -> Vec<usize> {
        self.data
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|c| c.iter().filter(|v| **v != 0).count())
            .collect()
    }
}
