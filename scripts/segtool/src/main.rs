//! 批量维护 3D Slicer OCT 分割文件 (`.seg.nrrd`) 的命令行工具.

mod cli;
mod result;
mod runner;

use clap::Parser;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use std::process;
use utils::loader::{seg_dir_from_env_or_home, seg_files, SEG_EXT};

use cli::Cli;
use runner::RunOptions;

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("cannot initialize logger: {e}");
    }

    let Some(path) = cli.path.clone().or_else(seg_dir_from_env_or_home) else {
        error!("no input path given and the home directory is unknown");
        process::exit(1);
    };
    let files = match seg_files(&path, SEG_EXT) {
        Ok(files) => files,
        Err(e) => {
            error!("cannot list {}: {e}", path.display());
            process::exit(1);
        }
    };
    if files.is_empty() {
        info!("no .{SEG_EXT} files under {}", path.display());
        return;
    }

    let opts = RunOptions {
        jobs: cli.jobs.unwrap_or_else(utils::cpus).max(1),
        fail_fast: cli.fail_fast,
    };
    info!(
        "{:?} on {} files with {} jobs",
        cli.action,
        files.len(),
        opts.jobs
    );

    let report = match runner::run(&files, &cli.action, opts) {
        Ok(report) => report,
        Err(e) => {
            error!("cannot start worker threads: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = report.analyze() {
        error!("cannot print the report: {e}");
    }
    process::exit(report.exit_code());
}
