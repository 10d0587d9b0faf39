//! 集計ツールの終了コードテスト

use std::process::Command;
use tempfile::tempdir;

fn aggregate_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_chart-aggregate"))
}

/// 引数の数が違えば使用方法を表示して終了コード1
#[test]
fn test_wrong_argument_count() {
    let output = aggregate_bin().arg("only-one").output().expect("起動失敗");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("使用方法"));
}

/// DBファイルがなければ終了コード1
#[test]
fn test_missing_database() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output = aggregate_bin()
        .arg(dir.path().join("none.db"))
        .arg(dir.path())
        .arg(dir.path().join("out"))
        .output()
        .expect("起動失敗");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("データベースファイルが存在しません"));
}

/// 空のデータベースでも正常終了
#[test]
fn test_empty_database_succeeds() {
    let dir = tempdir().expect("Failed to create temp dir");
    let db = dir.path().join("database.db");
    chart_diag::store::SqliteStore::open(&db, 3).expect("DB作成失敗");

    let output = aggregate_bin()
        .arg(&db)
        .arg(dir.path())
        .arg(dir.path().join("out"))
        .env("HOME", dir.path())
        .env_remove("CHART_DIAG_MAX_CHARTS")
        .output()
        .expect("起動失敗");
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("取得したチャート数: 0"));
    assert!(stdout.contains("=== 集計完了 ==="));
}

/// 余分な引数も使用方法を表示して終了コード1
#[test]
fn test_extra_argument() {
    let output = aggregate_bin().args(["a", "b", "c", "d"]).output().expect("起動失敗");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("使用方法"));
}

/// -v はどの位置でも受け付ける
#[test]
fn test_verbose_flag_with_positionals() {
    let dir = tempdir().expect("Failed to create temp dir");
    let db = dir.path().join("database.db");
    chart_diag::store::SqliteStore::open(&db, 3).expect("DB作成失敗");

    let output = aggregate_bin()
        .arg(&db)
        .arg("-v")
        .arg(dir.path())
        .arg(dir.path().join("out"))
        .env("HOME", dir.path())
        .env_remove("CHART_DIAG_MAX_CHARTS")
        .output()
        .expect("起動失敗");
    assert_eq!(output.status.code(), Some(0));
}

/// 設定が壊れていれば黙って既定値を使わず終了コード1
#[test]
fn test_broken_config_fails() {
    let dir = tempdir().expect("Failed to create temp dir");
    let db = dir.path().join("database.db");
    chart_diag::store::SqliteStore::open(&db, 3).expect("DB作成失敗");

    let output = aggregate_bin()
        .arg(&db)
        .arg(dir.path())
        .arg(dir.path().join("out"))
        .env("HOME", dir.path())
        .env("CHART_DIAG_MAX_CHARTS", "many")
        .output()
        .expect("起動失敗");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("CHART_DIAG_MAX_CHARTS"));

    let config_dir = dir.path().join(".config").join("chart-diag");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.json"), "{broken").unwrap();
    let output = aggregate_bin()
        .arg(&db)
        .arg(dir.path())
        .arg(dir.path().join("out"))
        .env("HOME", dir.path())
        .env_remove("CHART_DIAG_MAX_CHARTS")
        .output()
        .expect("起動失敗");
    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("=== 集計完了 ==="));
}
