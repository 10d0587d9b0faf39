//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use chart_diag::error::ChartDiagError;
use chart_diag::store::{register_chart, SqliteStore};
use chart_diag_common::{compile, CompileError, Error};

const CSV: &str = "\
体調チェック
decision

1,1,熱はありますか,はい,いいえ,,,,10,11,,,

10,受診してください
11,様子を見ましょう
";

/// 診断結果セクションがなければ構造エラー
#[test]
fn test_missing_diagnoses_is_structural() {
    let csv = "体調チェック\ndecision\n\n1,1,熱はありますか,はい,いいえ,,,,10,11,,,\n2,1,咳は出ますか,はい,いいえ,,,,10,11,,,\n";
    let err = compile(csv).unwrap_err();
    assert!(matches!(err, CompileError::Structural(_)));
}

/// 同名チャートの登録
#[test]
fn test_register_duplicate_chart() {
    let store = SqliteStore::in_memory(3).unwrap();
    let chart = compile(CSV).unwrap();
    register_chart(&store, &chart).unwrap();

    let err = register_chart(&store, &chart).unwrap_err();
    assert!(matches!(err, ChartDiagError::DuplicateName(_)));
    assert_eq!(err.to_string(), "同じ名前のチャートが既に存在します: 体調チェック");
}

/// 上限を超える登録
#[test]
fn test_register_over_limit() {
    let store = SqliteStore::in_memory(1).unwrap();
    let chart = compile(CSV).unwrap();
    register_chart(&store, &chart).unwrap();

    let mut other = chart.clone();
    other.name = "別チャート".to_string();
    let err = register_chart(&store, &other).unwrap_err();
    assert!(matches!(err, ChartDiagError::ChartLimit(1)));
}

/// コアのエラーはそのまま表示
#[test]
fn test_common_error_is_transparent() {
    let err: ChartDiagError = compile("a\nb").unwrap_err().into();
    assert!(matches!(err, ChartDiagError::Common(Error::Compile(CompileError::Structural(_)))));
    assert!(err.to_string().starts_with("structural error"));
}

/// ChartDiagErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        ChartDiagError::Config("テスト設定エラー".to_string()),
        ChartDiagError::ChartNotFound("なし".to_string()),
        ChartDiagError::DatabaseNotFound("db".to_string()),
        ChartDiagError::PhotoDirNotFound("photos".to_string()),
        ChartDiagError::OutputDir("out".to_string()),
        ChartDiagError::Prompt("中断".to_string()),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty());
        assert!(!display.contains('\n'));
    }
}
