//! 診断チャートの保存先・集計・CLI
//!
//! コア（コンパイル・評価・暗号化）は `chart_diag_common` にある。

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod photo_store;
pub mod play;
pub mod run_file;
pub mod save;
pub mod store;

pub use error::{ChartDiagError, Result};
