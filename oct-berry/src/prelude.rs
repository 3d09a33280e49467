//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::consts::{full_labels, EXTENSION_COLOR_MAP, ORIGINAL_LABELS};
pub use crate::engine::{
    add_segment, add_segments, clear_segment_data, correct_labels, crop_xy,
    delete_segment_by_name, refresh_extents, remove_slice, renumber_segments, require_labels,
    validate_and_trim, AddStatus, DeletePolicy,
};
pub use crate::overlay::{overlay_slice, unlabeled_voxels, UnlabeledSlice};
pub use crate::{
    ChannelArray, CropMargins, HeaderStore, NrrdError, Rgb, SegError, SegResult, SegVolume,
    Severity,
};
