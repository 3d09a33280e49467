//! 运行时错误.

use thiserror::Error;

/// 分割 header/通道操作的运行时错误.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegError {
    /// 删除目标属于受保护的原始标签.
    #[error("label `{0}` is protected and cannot be deleted")]
    ProtectedLabel(String),

    /// header 中不存在该名称的 segment.
    #[error("label `{0}` not found in header")]
    NotFound(String),

    /// 删除目标的索引低于允许删除的最小索引.
    #[error("label `{name}` sits at index {index}, below the deletable minimum {min}")]
    ProtectedIndex {
        /// 标签名.
        name: String,
        /// 该标签的 segment 索引.
        index: usize,
        /// 允许删除的最小索引.
        min: usize,
    },

    /// 出现了必需标签以外的标签.
    #[error("`{0}` is not one of the required labels, use force to delete it")]
    UnexpectedLabel(String),

    /// 缺少某个必需标签.
    #[error("required label `{0}` not found in header")]
    MissingLabel(String),

    /// 缺少若干必需标签.
    #[error("labels {} not in header", .0.join(", "))]
    MissingLabels(Vec<String>),

    /// 必需标签没有按照规定顺序占据最低的通道.
    #[error("required label `{label}` expected at position {expected}, found at {found:?}")]
    OutOfOrder {
        /// 标签名.
        label: String,
        /// 期望的序位.
        expected: usize,
        /// 实际序位.
        found: Option<usize>,
    },

    /// 颜色字段无法解析为 `[0, 1]` 内的三个浮点数.
    #[error("bad color format: `{0}`")]
    BadColorFormat(String),

    /// 新 segment 名称为空.
    #[error("segment name must not be empty")]
    EmptyName,

    /// header 中存在重名 segment.
    #[error("duplicate labels found: {}", .0.join(", "))]
    DuplicateNames(Vec<String>),

    /// 批量追加开始后又遇到已存在的名称, 说明 header 不处于期望的尾部追加状态.
    #[error("`{0}` exists out of position, check the header manually")]
    OutOfOrderDuplicate(String),

    /// header 结构损坏.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// `sizes` 与通道数组形状不一致.
    #[error("header sizes {sizes:?} do not match channel array shape {shape:?}")]
    ShapeMismatch {
        /// header 中记录的 `sizes`.
        sizes: Vec<i64>,
        /// 通道数组的实际形状.
        shape: Vec<usize>,
    },

    /// 操作要求的空间维数不符.
    #[error("expected {expected} spatial axes, found {found}")]
    Dimensionality {
        /// 期望的空间维数.
        expected: usize,
        /// 实际空间维数.
        found: usize,
    },

    /// 切片索引越界.
    #[error("slice {index} out of range for {len} slices")]
    SliceOutOfRange {
        /// 请求删除的切片索引.
        index: usize,
        /// 切片总数.
        len: usize,
    },

    /// 裁剪量超过了轴长度.
    #[error("cropping {margin} voxels leaves nothing of an axis of length {len}")]
    CropTooLarge {
        /// 该轴上的总裁剪量.
        margin: usize,
        /// 轴长度.
        len: usize,
    },
}

/// 错误的严重程度, 决定批处理是否继续.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Severity {
    /// 仅作提示, 文件视为已处理.
    Warning,

    /// 当前文件的操作中止, 批处理可以继续处理下一个文件.
    Recoverable,

    /// 数据或程序已损坏, 必须停止整个批处理.
    Fatal,
}

impl SegError {
    /// 获取错误的严重程度.
    pub fn severity(&self) -> Severity {
        use SegError::*;
        match self {
            NotFound(_) => Severity::Warning,
            OutOfOrderDuplicate(_) | MalformedHeader(_) | ShapeMismatch { .. } => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }

    /// 是否必须中止批处理.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
