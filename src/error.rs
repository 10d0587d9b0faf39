use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartDiagError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("同じ名前のチャートが既に存在します: {0}")]
    DuplicateName(String),

    #[error("チャートは最大{0}つまでしか保存できません")]
    ChartLimit(usize),

    #[error("指定されたチャートが見つかりません: {0}")]
    ChartNotFound(String),

    #[error("データベースファイルが存在しません: {0}")]
    DatabaseNotFound(String),

    #[error("写真ディレクトリが存在しません: {0}")]
    PhotoDirNotFound(String),

    #[error("写真パスがディレクトリではありません: {0}")]
    NotADirectory(String),

    #[error("出力先ディレクトリの作成に失敗しました: {0}")]
    OutputDir(String),

    #[error("チャート '{chart}' の処理に失敗: {message}")]
    ChartProcessing { chart: String, message: String },

    #[error("データベースエラー: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV出力エラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("対話入力エラー: {0}")]
    Prompt(String),

    #[error(transparent)]
    Common(#[from] chart_diag_common::Error),
}

impl From<chart_diag_common::CompileError> for ChartDiagError {
    fn from(e: chart_diag_common::CompileError) -> Self {
        ChartDiagError::Common(e.into())
    }
}

impl From<chart_diag_common::EvalError> for ChartDiagError {
    fn from(e: chart_diag_common::EvalError) -> Self {
        ChartDiagError::Common(e.into())
    }
}

impl From<chart_diag_common::CryptoError> for ChartDiagError {
    fn from(e: chart_diag_common::CryptoError) -> Self {
        ChartDiagError::Common(e.into())
    }
}

pub type Result<T> = std::result::Result<T, ChartDiagError>;
