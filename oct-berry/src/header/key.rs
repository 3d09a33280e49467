//! `Segment<N>_<Field>` 形式键的解析与构造.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::consts::keys::SEGMENT_PREFIX;

static SEGMENT_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Segment(\d+)_(.*)$").unwrap());

/// 解析后的 segment 键. 借用原始键中的字段部分.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SegmentKey<'a> {
    /// 数字后缀 `N`.
    pub index: usize,
    /// `_` 之后的字段名, 如 `Name`, `Color`.
    pub field: &'a str,
}

impl<'a> SegmentKey<'a> {
    /// 解析 `key`. 不符合 `Segment<N>_<Field>` 形式 (或 `N` 溢出) 时返回 `None`.
    pub fn parse(key: &'a str) -> Option<Self> {
        let caps = SEGMENT_KEY.captures(key)?;
        let index = caps.get(1)?.as_str().parse().ok()?;
        let field = caps.get(2)?.as_str();
        Some(Self { index, field })
    }
}

impl fmt::Display for SegmentKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SEGMENT_PREFIX}{}_{}", self.index, self.field)
    }
}

/// 构造 `Segment<index>_<field>`.
#[inline]
pub fn segment_key(index: usize, field: &str) -> String {
    SegmentKey { index, field }.to_string()
}

/// 获取 segment 键的数字后缀. 非 segment 键返回 `None`.
#[inline]
pub fn segment_index(key: &str) -> Option<usize> {
    SegmentKey::parse(key).map(|k| k.index)
}
