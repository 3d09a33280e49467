//! header 颜色字段的编解码.
//!
//! header 中的颜色以 `[0, 1]` 范围内的三个浮点数 (空格分隔) 保存,
//! 可视化时转换为 8-bit RGB. 该模块只服务于可视化, 不参与任何变更逻辑.

use std::cmp::Ordering;

use crate::consts::keys::COLOR;
use crate::consts::OCT_PALETTE;
use crate::error::SegError;
use crate::header::HeaderStore;
use crate::SegResult;

/// 8-bit RGB 颜色.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// 由 `[0, 1]` 浮点分量转换, 每个分量取 `round(255 * v)`.
    ///
    /// 分量不在 `[0, 1]` 内时返回 `Err(SegError::BadColorFormat)`.
    pub fn from_unit(unit: [f64; 3]) -> SegResult<Self> {
        check_unit(unit)?;
        Ok(Self(unit.map(|c| (255.0 * c).round() as u8)))
    }

    /// 转换为 `[0, 1]` 浮点分量.
    #[inline]
    pub fn to_unit(self) -> [f64; 3] {
        self.0.map(|c| c as f64 / 255.0)
    }

    /// 是否为纯黑.
    #[inline]
    pub fn is_black(self) -> bool {
        self.0 == [0; 3]
    }
}

/// 检查三个分量都是 `[0, 1]` 内的有限值.
fn check_unit(unit: [f64; 3]) -> SegResult<()> {
    if unit.iter().all(|c| (0.0..=1.0).contains(c)) {
        Ok(())
    } else {
        Err(SegError::BadColorFormat(format_unit(unit)))
    }
}

/// 解析 header 颜色文本, 如 `"0.635 0.0 1.0"`.
///
/// 文本必须恰好包含三个 `[0, 1]` 内的浮点数, 否则返回 `Err(SegError::BadColorFormat)`.
pub fn parse_unit(text: &str) -> SegResult<[f64; 3]> {
    let bad = || SegError::BadColorFormat(text.to_string());
    let parts = text
        .split_whitespace()
        .map(|s| s.parse::<f64>().map_err(|_| bad()))
        .collect::<SegResult<Vec<_>>>()?;
    let unit: [f64; 3] = parts.try_into().map_err(|_| bad())?;
    check_unit(unit).map_err(|_| bad())?;
    Ok(unit)
}

/// 以固定精度格式化 `[0, 1]` 浮点分量, 空格分隔.
#[inline]
pub fn format_unit([r, g, b]: [f64; 3]) -> String {
    format!("{r:.6} {g:.6} {b:.6}")
}

/// 将 8-bit 颜色编码为 header 颜色文本.
#[inline]
pub fn encode(rgb: Rgb) -> String {
    format_unit(rgb.to_unit())
}

/// 将 header 颜色文本解码为 8-bit 颜色.
#[inline]
pub fn decode_one(text: &str) -> SegResult<Rgb> {
    Rgb::from_unit(parse_unit(text)?)
}

/// 自然排序键的一段: 连续数字按数值比较, 其余按小写文本比较.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NaturalChunk {
    /// 连续数字.
    Num(u128),
    /// 非数字文本 (已转为小写).
    Text(String),
}

impl PartialOrd for NaturalChunk {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 数字段总是排在文本段之前.
impl Ord for NaturalChunk {
    fn cmp(&self, other: &Self) -> Ordering {
        use NaturalChunk::*;
        match (self, other) {
            (Num(a), Num(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (Num(_), Text(_)) => Ordering::Less,
            (Text(_), Num(_)) => Ordering::Greater,
        }
    }
}

/// 计算 `s` 的自然排序键, 使得 `Segment2` 排在 `Segment10` 之前.
pub fn natural_sort_key(s: &str) -> Vec<NaturalChunk> {
    let mut ans = Vec::new();
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        let is_digit = c.is_ascii_digit();
        let end = rest
            .find(|ch: char| ch.is_ascii_digit() != is_digit)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        ans.push(match chunk.parse::<u128>() {
            Ok(n) if is_digit => NaturalChunk::Num(n),
            _ => NaturalChunk::Text(chunk.to_lowercase()),
        });
        rest = tail;
    }
    ans
}

/// 从 header 中提取所有 segment 颜色, 按 `Segment<N>` 前缀的自然顺序排列.
///
/// 以 `Color` 结尾的键都会被收集 (`ColorAutoGenerated` 等不算).
/// 任一颜色无法解析时返回 `Err(SegError::BadColorFormat)`.
pub fn decode(header: &HeaderStore) -> SegResult<Vec<Rgb>> {
    let mut colors = header
        .iter()
        .filter(|(k, _)| k.ends_with(COLOR))
        .map(|(k, v)| -> SegResult<_> {
            let prefix = k.split('_').next().unwrap_or(k);
            let text = v.as_text().ok_or_else(|| SegError::BadColorFormat(v.to_string()))?;
            Ok((natural_sort_key(prefix), decode_one(text)?))
        })
        .collect::<SegResult<Vec<_>>>()?;
    colors.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(colors.into_iter().map(|(_, rgb)| rgb).collect())
}

/// 标准 OCT 标签调色板, 第 0 项为背景.
#[inline]
pub fn oct_palette() -> Vec<Rgb> {
    OCT_PALETTE.iter().copied().map(Rgb).collect()
}
