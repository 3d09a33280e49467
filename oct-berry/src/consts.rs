//! 通用常量.

/// OCTAVE 数据集中原始 (增广前) 的标签. 这些标签必须出现在每个分割文件中,
/// 且依次占据最低的 7 个通道.
pub const ORIGINAL_LABELS: [&str; 7] = ["CNV", "DRU", "EX", "FLU", "GA", "HEM", "RPE"];

/// 索引小于该值的 segment 属于原始标签, 不允许被删除.
pub const MIN_DELETABLE_INDEX: usize = ORIGINAL_LABELS.len();

/// 增广阶段追加的标签及其 header 颜色 (`[0, 1]` 浮点 RGB).
pub const EXTENSION_COLOR_MAP: [(&str, [f64; 3]); 8] = [
    ("RET", [0.635, 0.0, 1.0]),
    ("CHO", [0.56, 0.56, 0.44]),
    ("VIT", [0.88, 0.94, 0.99]),
    ("HYA", [0.46, 0.98, 0.99]),
    ("SHS", [0.69, 0.99, 0.82]),
    ("ART", [0.99, 0.99, 0.33]),
    ("ERM", [0.22, 0.49, 0.97]),
    ("SES", [0.392, 0.196, 0.0]),
];

/// 增广完成后, 一个分割文件应当包含的全部标签 (按通道顺序).
pub fn full_labels() -> Vec<&'static str> {
    ORIGINAL_LABELS
        .iter()
        .copied()
        .chain(EXTENSION_COLOR_MAP.iter().map(|(name, _)| *name))
        .collect()
}

/// header 相关的键名.
pub mod keys {
    /// 数据形状.
    pub const SIZES: &str = "sizes";

    /// 体数据原点.
    pub const SPACE_ORIGIN: &str = "space origin";

    /// segment 键的前缀, 完整形式为 `Segment<N>_<Field>`.
    pub const SEGMENT_PREFIX: &str = "Segment";

    /// segment 名称字段.
    pub const NAME: &str = "Name";

    /// segment 颜色字段.
    pub const COLOR: &str = "Color";

    /// segment 颜色是否自动生成.
    pub const COLOR_AUTO_GENERATED: &str = "ColorAutoGenerated";

    /// segment 空间范围字段.
    pub const EXTENT: &str = "Extent";

    /// segment 标识字段.
    pub const ID: &str = "ID";

    /// segment 名称是否自动生成.
    pub const NAME_AUTO_GENERATED: &str = "NameAutoGenerated";
}

/// 未计算 (或为空) 的 segment 空间范围, 与 3D Slicer 新建空 segment 时写入的值一致.
pub const UNDEFINED_EXTENT: [i64; 6] = [0, -1, -167, -168, 0, -1];

/// OCT 组织分割的标准 8-bit 调色板. 第 0 项为背景, 第 `i` 项对应第 `i - 1` 个通道.
pub const OCT_PALETTE: [[u8; 3]; 15] = [
    [0, 0, 0],
    [241, 214, 145],
    [177, 122, 101],
    [111, 184, 210],
    [216, 101, 79],
    [221, 130, 101],
    [144, 238, 144],
    [162, 0, 255],
    [143, 143, 112],
    [224, 240, 252],
    [117, 250, 252],
    [176, 252, 209],
    [252, 252, 84],
    [56, 125, 247],
    [100, 50, 0],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_labels_order() {
        let labels = full_labels();
        assert_eq!(labels.len(), 15);
        assert_eq!(&labels[..7], &ORIGINAL_LABELS);
        assert_eq!(labels[7], "RET");
        assert_eq!(labels[14], "SES");
    }
}
