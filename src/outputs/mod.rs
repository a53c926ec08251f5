//! Output of a finished run.
//!
//! # Submodules
//!
//! - [`xlsx`]: writes the report table to a spreadsheet
//! - [`notify`]: emails the spreadsheet to the configured recipients
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── alert-digest.xlsx          # every row processed
//! └── alert-digest-partial.xlsx  # summarization stopped early
//! ```

pub mod notify;
pub mod xlsx;
