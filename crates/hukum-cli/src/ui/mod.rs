//! # CLI UI Module
//!
//! Styling and formatting for `hukum` output.
//!
//! Human output is prefixed and colored when the terminal allows it
//! (`NO_COLOR` is respected); every data command also has a `--json` form
//! for scripting.
//!
//! ## Module Structure
//!
//! - `color`: color mode detection and terminal width
//! - `style`: message prefixes and styling helpers
//! - `format`: truncation, counts, relative time
//! - `table`: result tables with comfy-table
//! - `progress`: spinners for indexing and generation

pub mod color;
pub mod format;
pub mod progress;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use progress::{Progress, ProgressMode};
pub use style::{MessageType, Style};
