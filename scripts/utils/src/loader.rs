//! 分割文件的定位: 数据集目录, 文件列表与派生输出路径.

use oct_berry::color::natural_sort_key;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 分割文件扩展名.
pub const SEG_EXT: &str = "seg.nrrd";

/// 返回 `$HOME/dataset/{it}`. 无法获取 home 目录时返回 `None`.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 获取分割文件基本路径.
///
/// 1. 若环境变量 `$OCT_SEG_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/oct`.
pub fn seg_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var("OCT_SEG_DIR") {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(["oct"]),
    }
}

/// 文件名是否以 `.{ext}` 结尾 (不区分大小写).
fn has_ext(path: &Path, ext: &str) -> bool {
    let suffix = format!(".{}", ext.to_ascii_lowercase());
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_ascii_lowercase().ends_with(&suffix))
}

/// 列出 `path` 下所有扩展名为 `ext` 的文件, 按文件名自然排序.
///
/// 若 `path` 本身是文件, 则只返回它自己 (不检查扩展名).
pub fn seg_files<P: AsRef<Path>>(path: P, ext: &str) -> io::Result<Vec<PathBuf>> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut ans = Vec::new();
    for entry in fs::read_dir(path)? {
        let p = entry?.path();
        if p.is_file() && has_ext(&p, ext) {
            ans.push(p);
        }
    }
    ans.sort_by_cached_key(|p| natural_sort_key(&p.to_string_lossy()));
    Ok(ans)
}

/// 文件名第一个 `.` 之前的部分, 如 `P1.OCT.seg.nrrd` 的 `P1`.
pub fn seg_stem<P: AsRef<Path>>(path: P) -> String {
    let name = path
        .as_ref()
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    name.split('.').next().unwrap_or_default().to_string()
}

/// 派生输出路径: 同目录下的 `<stem>-new.seg.nrrd`.
pub fn derived_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    path.with_file_name(format!("{}-new.{SEG_EXT}", seg_stem(path)))
}
