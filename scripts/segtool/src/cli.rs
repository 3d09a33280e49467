//! 命令行参数.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Batch maintenance for 3D Slicer OCT segmentation files (.seg.nrrd).
#[derive(Parser, Debug)]
#[command(name = "segtool")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// A .seg.nrrd file or a directory of them [default: $OCT_SEG_DIR or $HOME/dataset/oct]
    #[arg(global = true, short, long)]
    pub path: Option<PathBuf>,

    /// Number of files processed in parallel [default: number of CPUs]
    #[arg(global = true, short, long)]
    pub jobs: Option<usize>,

    /// Stop the batch on the first failed file
    #[arg(global = true, long)]
    pub fail_fast: bool,

    /// Enable debug output
    #[arg(global = true, short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub action: Action,
}

/// 对每个文件执行的操作.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// List segments with their channel position, color, extent and voxel count
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Append the extension labels (RET, CHO, ..., SES) after the last segment
    Add,

    /// Delete a non-original label and its channel
    Delete {
        /// Label name
        #[arg(short, long)]
        label: String,
    },

    /// Check that the original labels occupy the lowest channels in order
    Validate {
        /// Delete labels that are not original labels
        #[arg(long)]
        force: bool,
    },

    /// Validate, then append the extension labels and check the final label set
    Correct {
        /// Delete labels that are not original labels
        #[arg(long)]
        force: bool,
    },

    /// Empty the mask of a label, keeping the label itself
    Erase {
        /// Label name
        #[arg(short, long)]
        label: String,
    },

    /// Remove one slice along the last axis, writing <stem>-new.seg.nrrd
    RemoveSlice {
        /// Index of the slice to remove
        #[arg(short, long, default_value_t = 0)]
        slice: usize,

        /// Report the new shape without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Crop along x and y, writing <stem>-new.seg.nrrd
    Crop {
        /// Voxels removed from the start of x
        #[arg(long, default_value_t = 0)]
        left: usize,

        /// Voxels removed from the end of x
        #[arg(long, default_value_t = 0)]
        right: usize,

        /// Voxels removed from the start of y
        #[arg(long, default_value_t = 0)]
        up: usize,

        /// Voxels removed from the end of y
        #[arg(long, default_value_t = 0)]
        down: usize,
    },

    /// Report voxels not covered by any label, per slice
    CheckUnlabeled,

    /// Write one color overlay PNG per slice
    Overlay {
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Use the standard OCT palette instead of the header colors
        #[arg(long)]
        palette: bool,
    },

    /// Rewrite segment key suffixes so they match channel positions
    Renumber,
}
