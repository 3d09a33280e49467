//! seg.nrrd 文件的读写.
//!
//! 只支持 segmentation 需要的子集: 数据附在 header 之后, 类型为 `uint8`,
//! 编码为 `raw` 或 `gzip`, 按 Fortran 顺序 (第一轴变化最快) 存储.
//!
//! header 中的 NRRD 字段 (`field: value`) 与键值对 (`key:=value`) 按出现顺序存入同一个
//! [`HeaderStore`]. 写出时, 已知的 NRRD 字段名使用 `: `, 其余键使用 `:=`.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

use crate::channel::ChannelArray;
use crate::consts::keys::{SIZES, SPACE_ORIGIN};
use crate::engine::SegVolume;
use crate::error::{SegError, Severity};
use crate::header::{HeaderStore, HeaderValue};

/// 读写 seg.nrrd 文件的错误.
#[derive(Debug, Error)]
pub enum NrrdError {
    /// 底层 I/O 错误.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 第一行不是 `NRRD000x`.
    #[error("not a NRRD file (first line `{0}`)")]
    BadMagic(String),

    /// 无法解析的 header 行.
    #[error("malformed header line `{0}`")]
    BadLine(String),

    /// 缺少必需的字段.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// 不支持的类型、编码或数据布局.
    #[error("unsupported {0}")]
    Unsupported(String),

    /// 数据字节数与 `sizes` 不符.
    #[error("expected {expected} data bytes, found {found}")]
    SizeMismatch {
        /// `sizes` 各项之积.
        expected: usize,
        /// 实际读到的字节数.
        found: usize,
    },

    /// 文件内容违反 header/通道一致性.
    #[error(transparent)]
    Seg(#[from] SegError),
}

impl NrrdError {
    /// 错误的严重程度.
    ///
    /// 文件无法打开、不是 NRRD 或使用了不支持的格式时可以跳过该文件;
    /// header 损坏或数据长度不符说明文件处于意外状态, 需要人工检查.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Io(_) | Self::BadMagic(_) | Self::Unsupported(_) => Severity::Recoverable,
            Self::BadLine(_) | Self::MissingField(_) | Self::SizeMismatch { .. } => Severity::Fatal,
            Self::Seg(e) => e.severity(),
        }
    }
}

/// `NRRD` 规范定义的字段名. 不在此列的键按键值对 (`:=`) 处理.
const KNOWN_FIELDS: [&str; 29] = [
    "type",
    "dimension",
    "space",
    "space dimension",
    "sizes",
    "space directions",
    "kinds",
    "endian",
    "encoding",
    "min",
    "max",
    "old min",
    "old max",
    "content",
    "sample units",
    "spacings",
    "thicknesses",
    "axis mins",
    "axis maxs",
    "centerings",
    "labels",
    "units",
    "space units",
    "space origin",
    "measurement frame",
    "data file",
    "line skip",
    "byte skip",
    "block size",
];

const UINT8_TYPES: [&str; 4] = ["uint8", "uchar", "unsigned char", "uint8_t"];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Encoding {
    Raw,
    Gzip,
}

fn encoding_of(header: &HeaderStore) -> Result<Encoding, NrrdError> {
    match header.get_text("encoding") {
        None => Err(NrrdError::MissingField("encoding")),
        Some("raw") => Ok(Encoding::Raw),
        Some("gzip" | "gz") => Ok(Encoding::Gzip),
        Some(other) => Err(NrrdError::Unsupported(format!("encoding `{other}`"))),
    }
}

fn check_type(header: &HeaderStore) -> Result<(), NrrdError> {
    match header.get_text("type") {
        None => Err(NrrdError::MissingField("type")),
        Some(t) if UINT8_TYPES.contains(&t) => Ok(()),
        Some(t) => Err(NrrdError::Unsupported(format!("type `{t}`"))),
    }
}

/// 将一行 header 解析为键和值. `sizes` 与 `space origin` 解析为对应的结构化值.
fn parse_line(line: &str) -> Result<(String, HeaderValue), NrrdError> {
    let bad = || NrrdError::BadLine(line.to_string());
    let (key, value) = line
        .split_once(":=")
        .or_else(|| line.split_once(": "))
        .ok_or_else(bad)?;
    let value = match key {
        SIZES => HeaderValue::IntTuple(
            value
                .split_whitespace()
                .map(|s| s.parse().map_err(|_| bad()))
                .collect::<Result<_, _>>()?,
        ),
        SPACE_ORIGIN => parse_triple(value).map_or_else(
            || HeaderValue::Text(value.to_string()),
            HeaderValue::FloatTriple,
        ),
        _ => HeaderValue::Text(value.to_string()),
    };
    Ok((key.to_string(), value))
}

/// 解析 `(x,y,z)` 形式的向量.
fn parse_triple(text: &str) -> Option<[f64; 3]> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    let v: Vec<f64> = inner
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    v.try_into().ok()
}

/// 从 `reader` 读取完整的 seg.nrrd 内容.
pub fn read_nrrd<R: Read>(reader: R) -> Result<SegVolume, NrrdError> {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let magic = line.trim_end();
    if !(magic.len() == 8 && magic.starts_with("NRRD000")) {
        return Err(NrrdError::BadMagic(magic.to_string()));
    }

    let mut header = HeaderStore::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let l = line.trim_end_matches(['\r', '\n']);
        if l.is_empty() {
            break;
        }
        if l.starts_with('#') {
            continue;
        }
        let (k, v) = parse_line(l)?;
        header.insert(k, v);
    }

    check_type(&header)?;
    let encoding = encoding_of(&header)?;
    for field in ["data file", "datafile"] {
        if header.contains_key(field) {
            return Err(NrrdError::Unsupported("detached data".to_string()));
        }
    }
    let sizes = header
        .get(SIZES)
        .and_then(HeaderValue::as_ints)
        .ok_or(NrrdError::MissingField("sizes"))?;
    let shape = sizes
        .iter()
        .map(|&s| usize::try_from(s))
        .collect::<Result<Vec<usize>, _>>()
        .map_err(|_| NrrdError::BadLine(format!("sizes: {sizes:?}")))?;
    let expected = shape
        .iter()
        .try_fold(1usize, |n, &s| n.checked_mul(s))
        .ok_or_else(|| NrrdError::BadLine(format!("sizes: {sizes:?} overflows")))?;

    let mut bytes = Vec::new();
    match encoding {
        Encoding::Raw => reader.read_to_end(&mut bytes)?,
        Encoding::Gzip => GzDecoder::new(reader).read_to_end(&mut bytes)?,
    };
    if bytes.len() != expected {
        return Err(NrrdError::SizeMismatch {
            expected,
            found: bytes.len(),
        });
    }
    debug!("Read {expected} bytes, shape {shape:?}, {encoding:?}");

    let data = ArrayD::from_shape_vec(IxDyn(&shape).f(), bytes).map_err(|_| {
        NrrdError::SizeMismatch {
            expected,
            found: expected,
        }
    })?;
    Ok(SegVolume::new(header, ChannelArray::new(data)?)?)
}

/// 将 `volume` 写入 `writer`. 编码由 header 的 `encoding` 字段决定.
pub fn write_nrrd<W: Write>(writer: W, volume: &SegVolume) -> Result<(), NrrdError> {
    let header = volume.header();
    check_type(header)?;
    let encoding = encoding_of(header)?;

    let mut w = BufWriter::new(writer);
    writeln!(w, "NRRD0004")?;
    for (k, v) in header.iter() {
        if KNOWN_FIELDS.contains(&k) {
            writeln!(w, "{k}: {v}")?;
        } else {
            writeln!(w, "{k}:={v}")?;
        }
    }
    writeln!(w)?;

    // 转置后按逻辑顺序迭代, 即原数组的 Fortran 顺序.
    let bytes: Vec<u8> = volume.channels().data().t().iter().copied().collect();
    match encoding {
        Encoding::Raw => w.write_all(&bytes)?,
        Encoding::Gzip => {
            let mut e = GzEncoder::new(&mut w, Compression::default());
            e.write_all(&bytes)?;
            e.finish()?;
        }
    }
    w.flush()?;
    Ok(())
}

impl SegVolume {
    /// 从路径 `path` 打开 seg.nrrd 文件.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, NrrdError> {
        read_nrrd(File::open(path)?)
    }

    /// 将自我写入路径 `path`. 已存在的文件会被覆盖.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), NrrdError> {
        write_nrrd(File::create(path)?, self)
    }
}
