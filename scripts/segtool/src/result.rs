//! 批处理结果.

use std::io::{self, Write};
use std::path::PathBuf;

/// 单个文件的处理结果.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 处理成功.
    Succeeded(String),

    /// 无需任何修改.
    Skipped(String),

    /// 处理完成, 但存在需要人工注意的情况.
    Warned(String),

    /// 处理失败, 文件保持不变.
    Failed {
        /// 错误信息.
        message: String,
        /// 是否为致命错误.
        fatal: bool,
    },

    /// 批处理已中止, 该文件未被处理.
    NotStarted,
}

/// 各类结果的文件数.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: usize,
    pub skipped: usize,
    pub warned: usize,
    pub failed: usize,
    pub not_started: usize,
}

/// 一次批处理的最终结果, 按文件处理顺序排列.
pub struct BatchReport {
    files: Vec<(PathBuf, Outcome)>,
}

impl FromIterator<(PathBuf, Outcome)> for BatchReport {
    fn from_iter<I: IntoIterator<Item = (PathBuf, Outcome)>>(it: I) -> Self {
        Self {
            files: it.into_iter().collect(),
        }
    }
}

impl BatchReport {
    /// 统计各类结果.
    pub fn tally(&self) -> Tally {
        let mut t = Tally::default();
        for (_, outcome) in self.files.iter() {
            match outcome {
                Outcome::Succeeded(_) => t.succeeded += 1,
                Outcome::Skipped(_) => t.skipped += 1,
                Outcome::Warned(_) => t.warned += 1,
                Outcome::Failed { .. } => t.failed += 1,
                Outcome::NotStarted => t.not_started += 1,
            }
        }
        t
    }

    /// 是否出现了致命错误.
    pub fn has_fatal(&self) -> bool {
        self.files
            .iter()
            .any(|(_, o)| matches!(o, Outcome::Failed { fatal: true, .. }))
    }

    /// 进程退出码: 致命错误为 2, 其他失败为 1, 否则为 0.
    pub fn exit_code(&self) -> i32 {
        if self.has_fatal() {
            2
        } else if self.tally().failed > 0 {
            1
        } else {
            0
        }
    }

    /// 将每个文件的结果和最终统计写进 `w` 中.
    pub fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        for (path, outcome) in self.files.iter() {
            let (tag, message) = match outcome {
                Outcome::Succeeded(m) => ("ok", m.as_str()),
                Outcome::Skipped(m) => ("skipped", m.as_str()),
                Outcome::Warned(m) => ("warning", m.as_str()),
                Outcome::Failed { message, fatal: true } => ("FATAL", message.as_str()),
                Outcome::Failed { message, .. } => ("failed", message.as_str()),
                Outcome::NotStarted => ("not started", ""),
            };
            writeln!(w, "[{tag}] {}", path.display())?;
            for line in message.lines() {
                writeln!(w, "{S4}{line}")?;
            }
        }

        let t = self.tally();
        utils::sep_to(&mut *w)?;
        write!(
            w,
            "{} succeeded, {} skipped, {} warned, {} failed",
            t.succeeded, t.skipped, t.warned, t.failed
        )?;
        if t.not_started > 0 {
            write!(w, ", {} not started", t.not_started)?;
        }
        writeln!(w)
    }

    /// 打印运行结果.
    pub fn analyze(&self) -> io::Result<()> {
        let mut buf = Vec::with_capacity(512);
        self.describe_into(&mut buf)?;
        io::stdout().write_all(&buf)
    }
}
