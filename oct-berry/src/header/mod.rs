//! 有序 header 存储.
//!
//! 对应一个 seg.nrrd 文件的全部元信息. 键的先后顺序是有意义的:
//! 下游可视化工具 (如 3D Slicer) 按位置读取 segment 块.

use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt;

use crate::consts::keys::{SIZES, SPACE_ORIGIN};
use crate::error::SegError;
use crate::SegResult;

mod key;

pub use key::{segment_index, segment_key, SegmentKey};

/// header 值. 在边界 (文件读写) 处显式编解码.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeaderValue {
    /// 任意文本. segment 字段均以文本保存.
    Text(String),

    /// 整数序列, 如 `sizes`.
    IntTuple(Vec<i64>),

    /// 三元浮点向量, 如 `space origin`.
    FloatTriple([f64; 3]),
}

impl HeaderValue {
    /// 以文本形式获取值. 非文本返回 `None`.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 以整数序列形式获取值. 非整数序列返回 `None`.
    #[inline]
    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Self::IntTuple(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for HeaderValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// 按 NRRD 的书写习惯输出: 整数序列以空格分隔, 三元向量写作 `(x,y,z)`.
impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::IntTuple(v) => write!(f, "{}", v.iter().join(" ")),
            Self::FloatTriple([x, y, z]) => write!(f, "({x},{y},{z})"),
        }
    }
}

/// 插入有序的 header 键值存储.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeaderStore {
    entries: IndexMap<String, HeaderValue>,
}

impl FromIterator<(String, HeaderValue)> for HeaderStore {
    fn from_iter<I: IntoIterator<Item = (String, HeaderValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl HeaderStore {
    /// 创建空 header.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 键值对个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 插入键值对. 若键已存在, 则原地替换值, 位置不变.
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// 获取 `key` 对应的值.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries.get(key)
    }

    /// 获取 `key` 对应的文本值. 键不存在或值不是文本时返回 `None`.
    #[inline]
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_text)
    }

    /// 是否包含 `key`.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 获取 `key` 在存储中的位置.
    #[inline]
    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    /// 删除 `key`, 保持其余键的相对顺序.
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<HeaderValue> {
        self.entries.shift_remove(key)
    }

    /// 只保留满足 `keep` 的键值对, 保持相对顺序.
    #[inline]
    pub fn retain<F: FnMut(&str, &HeaderValue) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|k, v| keep(k.as_str(), &*v));
    }

    /// 在位置 `at` 处依次插入 `items`, 其后的键整体后移.
    ///
    /// `items` 中的键必须是新键, 否则返回 `Err(SegError::MalformedHeader)` 且不修改 `self`.
    /// 当 `at > self.len()` 时程序 panic.
    pub fn splice_at<I>(&mut self, at: usize, items: I) -> SegResult<()>
    where
        I: IntoIterator<Item = (String, HeaderValue)>,
    {
        assert!(at <= self.len(), "插入位置越界");
        let items: Vec<_> = items.into_iter().collect();
        if let Some((k, _)) = items.iter().find(|(k, _)| self.contains_key(k)) {
            return Err(SegError::MalformedHeader(format!("key `{k}` already exists")));
        }
        let tail = self.entries.split_off(at);
        self.entries.extend(items);
        self.entries.extend(tail);
        Ok(())
    }

    /// 按存储顺序迭代所有键.
    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// 按存储顺序迭代所有键值对.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 按存储顺序迭代所有 segment 键, 同时给出解析结果.
    pub fn segment_entries(&self) -> impl Iterator<Item = (SegmentKey<'_>, &HeaderValue)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| SegmentKey::parse(k).map(|sk| (sk, v)))
    }

    /// 获取 `sizes`.
    ///
    /// 缺失或不是整数序列时返回 `Err(SegError::MalformedHeader)`.
    pub fn sizes(&self) -> SegResult<&[i64]> {
        self.get(SIZES)
            .and_then(HeaderValue::as_ints)
            .ok_or_else(|| SegError::MalformedHeader("missing integer `sizes`".to_string()))
    }

    /// 以数组形状覆写 `sizes`. 若原本不存在则追加到末尾.
    pub fn set_sizes(&mut self, shape: &[usize]) {
        let v = shape.iter().map(|&s| s as i64).collect();
        self.insert(SIZES, HeaderValue::IntTuple(v));
    }

    /// 将 `space origin` 重置为原点. 若原本不存在则不做任何事.
    pub fn reset_space_origin(&mut self) {
        if let Some(v) = self.entries.get_mut(SPACE_ORIGIN) {
            *v = HeaderValue::FloatTriple([0.0; 3]);
        }
    }
}
