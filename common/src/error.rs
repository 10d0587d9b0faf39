//! エラー型定義
//!
//! - CompileError: CSVからのチャート生成失敗（構造エラー / 行単位の書式エラー）
//! - EvalError: チャート遷移時の参照エラー
//! - CryptoError: 写真暗号化・復号の失敗

use std::fmt;
use thiserror::Error;

/// CSVの1行・1フィールドに対する検証エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    /// 1始まりの行番号
    pub line: usize,
    pub field: String,
    pub message: String,
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} [{}]: {}", self.line, self.field, self.message)
    }
}

/// 書式エラーの一覧表示用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssues(pub Vec<RowIssue>);

impl fmt::Display for RowIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "({} issue(s)): {}", self.0.len(), lines.join("; "))
    }
}

/// CSVコンパイルエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// 必須セクションの欠落など、走査を続けられない構造上の問題
    #[error("structural error: {0}")]
    Structural(String),

    /// 全行を走査した上で見つかった書式エラーの集約
    #[error("format error {0}")]
    Format(RowIssues),
}

impl CompileError {
    /// 書式エラーの明細（構造エラーなら空）
    pub fn issues(&self) -> &[RowIssue] {
        match self {
            CompileError::Format(issues) => &issues.0,
            CompileError::Structural(_) => &[],
        }
    }
}

/// チャート評価エラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("unknown question id {0}")]
    UnknownQuestion(i64),

    #[error("invalid choice {choice} for question {question_id} ({count} choices)")]
    InvalidChoice {
        question_id: i64,
        choice: usize,
        count: usize,
    },

    #[error("question {0} not found")]
    QuestionNotFound(i64),

    #[error("diagnosis {0} not found")]
    DiagnosisNotFound(i64),

    #[error("no diagnosis matches score {0}")]
    NoDiagnosisForScore(i64),

    #[error("run is already completed with diagnosis {0}")]
    AlreadyCompleted(i64),

    #[error("run of a {run} chart cannot be answered against a {chart} chart")]
    ChartTypeMismatch { chart: String, run: String },

    #[error("chart has no questions")]
    EmptyChart,

    #[error("score overflowed at question {question_id}")]
    ScoreOverflow { question_id: i64 },

    #[error("question {0} has no following question id")]
    NoFollowingQuestion(i64),
}

/// 暗号処理エラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("random source error: {0}")]
    RandomSource(String),

    #[error("cipher init error: key must be 32 bytes, got {0}")]
    CipherInit(usize),

    #[error("encrypted data is too short ({0} bytes, need at least 16)")]
    TruncatedInput(usize),
}

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("invalid run state: {0}")]
    InvalidRun(String),

    #[error("invalid stored result: {0}")]
    InvalidResult(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
