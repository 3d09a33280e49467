//! segment 空间范围.

use itertools::Itertools;
use std::fmt;
use std::str::FromStr;

use crate::consts::UNDEFINED_EXTENT;

/// segment 非背景体素的包围盒, 按 `(x_min x_max y_min y_max z_min z_max)` 排列,
/// 两端均为闭区间.
///
/// 任一轴上 `min > max` 表示空范围; [`Extent::UNDEFINED`] 是新建 segment 写入的哨兵值.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extent(pub [i64; 6]);

impl Extent {
    /// 未定义范围的哨兵值.
    pub const UNDEFINED: Extent = Extent(UNDEFINED_EXTENT);

    /// 由三个轴上的闭区间 `(min, max)` 构造.
    #[inline]
    pub fn from_bounds([(x0, x1), (y0, y1), (z0, z1)]: [(usize, usize); 3]) -> Self {
        Self([x0, x1, y0, y1, z0, z1].map(|v| v as i64))
    }

    /// 是否为空范围 (包括哨兵值).
    #[inline]
    pub fn is_empty(&self) -> bool {
        let [x0, x1, y0, y1, z0, z1] = self.0;
        x0 > x1 || y0 > y1 || z0 > z1
    }
}

impl Default for Extent {
    #[inline]
    fn default() -> Self {
        Self::UNDEFINED
    }
}

/// 以空格分隔输出六个整数, 与 header 中的写法一致.
impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(" "))
    }
}

/// `Extent` 解析错误: 文本不是恰好六个整数.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ParseExtentError;

impl FromStr for Extent {
    type Err = ParseExtentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v: Vec<i64> = s
            .split_whitespace()
            .map(|p| p.parse().map_err(|_| ParseExtentError))
            .collect::<Result<_, _>>()?;
        let arr: [i64; 6] = v.try_into().map_err(|_| ParseExtentError)?;
        Ok(Self(arr))
    }
}
