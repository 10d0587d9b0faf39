//! Chart Diag Common Library
//!
//! 診断チャートのコア（CSVコンパイル・評価・写真暗号化）。
//! 保存先やCLIはルートクレートが担当する。

pub mod types;
pub mod error;
pub mod crypto;
pub mod compiler;
pub mod evaluator;
pub mod run;
pub mod reclassify;

pub use types::{CategoryPoint, ChartDocument, ChartType, Diagnosis, HistoryEntry, Question, StoredResult};
pub use error::{CompileError, CryptoError, Error, EvalError, Result, RowIssue};
pub use compiler::compile;
pub use evaluator::{answer, start, Progress, RangeRule, RunState, Score, Transition};
pub use run::{MemoryRepository, RunStateRepository, RunStateWire, Session};
pub use reclassify::{CategoryOutcome, PointData};
