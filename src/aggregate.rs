//! 診断結果の集計
//!
//! チャートごとに保存済みの結果を読み出し、診断結果の文章を再判定して
//! `<出力先>/<チャート名>.csv` に書き出す（ファイル名に使えない文字は `_`）。暗号化された写真は結果ごとの
//! パスフレーズで復号し `<出力先>/<結果ID>.jpg` に書き出す。
//!
//! 写真がない・復号できない結果は警告してその写真だけ飛ばす。

use crate::error::{ChartDiagError, Result};
use crate::photo_store::{PhotoDir, PhotoStore};
use crate::store::{ChartStore, ResultStore, SqliteStore};
use chart_diag_common::crypto;
use chart_diag_common::reclassify::{self, PointData};
use chart_diag_common::{ChartDocument, ChartType, StoredResult};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// チャート1件分の集計結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSummary {
    pub name: String,
    pub results: usize,
    pub photos: usize,
    pub csv_path: PathBuf,
}

/// 引数の検証。出力先がなければ作成し、作成した場合は true
pub fn validate_args(db_path: &Path, photo_dir: &Path, output_dir: &Path) -> Result<bool> {
    if !db_path.exists() {
        return Err(ChartDiagError::DatabaseNotFound(db_path.display().to_string()));
    }

    if !photo_dir.exists() {
        return Err(ChartDiagError::PhotoDirNotFound(photo_dir.display().to_string()));
    }
    if !photo_dir.is_dir() {
        return Err(ChartDiagError::NotADirectory(photo_dir.display().to_string()));
    }

    if output_dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(output_dir)
        .map_err(|e| ChartDiagError::OutputDir(format!("{}: {}", output_dir.display(), e)))?;
    Ok(true)
}

/// データベースファイルと写真ディレクトリから集計
pub fn aggregate(db_path: &Path, photo_dir: &Path, output_dir: &Path, photo_extension: &str) -> Result<Vec<ChartSummary>> {
    let store = SqliteStore::open(db_path, usize::MAX)?;
    let photos = PhotoDir::new(photo_dir);
    aggregate_store(&store, &photos, output_dir, photo_extension)
}

/// 保存先を指定して集計
pub fn aggregate_store<S, P>(store: &S, photos: &P, output_dir: &Path, photo_extension: &str) -> Result<Vec<ChartSummary>>
where
    S: ChartStore + ResultStore + ?Sized,
    P: PhotoStore + ?Sized,
{
    let records = store.list_records()?;
    println!("取得したチャート数: {}", records.len());

    let mut summaries = Vec::with_capacity(records.len());
    for record in records {
        println!("\nチャート '{}' を処理中...", record.name);
        let failed = |e: ChartDiagError| ChartDiagError::ChartProcessing {
            chart: record.name.clone(),
            message: e.to_string(),
        };

        let results = store.results_for_chart(&record.name).map_err(failed)?;
        println!("  診断結果数: {}件", results.len());

        let chart = record.document().map_err(failed)?;

        let csv_path = output_dir.join(csv_file_name(&record.name));
        write_chart_csv(&csv_path, &chart, &results).map_err(failed)?;
        println!("  CSVファイルを生成: {}", csv_path.display());

        let decrypted = decrypt_photos(&results, photos, output_dir, photo_extension).map_err(failed)?;
        println!("  復号化した写真数: {}件", decrypted);

        summaries.push(ChartSummary {
            name: record.name,
            results: results.len(),
            photos: decrypted,
            csv_path,
        });
    }

    Ok(summaries)
}

/// チャート名から出力先の外に出ないCSVファイル名を作る
pub fn csv_file_name(chart_name: &str) -> String {
    let stem: String = chart_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if stem.trim_matches('.').is_empty() {
        format!("_{}.csv", stem)
    } else {
        format!("{}.csv", stem)
    }
}

/// チャートタイプに応じたCSVヘッダー
pub fn csv_header(chart: &ChartDocument) -> Vec<String> {
    match chart.chart_type {
        ChartType::Decision => ["ID", "時刻", "結果番号", "文章", "選択履歴"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ChartType::Single | ChartType::Multi | ChartType::LegacyPoint => {
            let mut header = vec!["ID".to_string(), "時刻".to_string()];
            for i in 1..=chart.categories().len() {
                header.push(format!("{}番目カテゴリ名前", i));
                header.push(format!("{}番目カテゴリのポイント", i));
                header.push(format!("{}番目カテゴリの結果文章", i));
            }
            header
        }
    }
}

/// 結果1件分のCSV行
pub fn csv_row(chart: &ChartDocument, result: &StoredResult) -> Result<Vec<String>> {
    let mut row = vec![result.id.to_string(), result.timestamp.clone()];

    match chart.chart_type {
        ChartType::Decision => {
            let diagnosis = reclassify::decision_diagnosis(chart, &result.result_id)?;
            row.push(result.result_id.clone());
            row.push(diagnosis.sentence.clone());
        }
        ChartType::Single | ChartType::Multi | ChartType::LegacyPoint => {
            let data = PointData::parse(&result.point)?;
            for outcome in reclassify::category_outcomes(chart, &data) {
                row.push(outcome.category);
                row.push(outcome.point.to_string());
                row.push(outcome.sentence);
            }
        }
    }

    for entry in result.history()? {
        row.push(entry.question_id.to_string());
        row.push(entry.choice.to_string());
    }
    Ok(row)
}

/// チャート1件分のCSVを書き出す
pub fn write_chart_csv(path: &Path, chart: &ChartDocument, results: &[StoredResult]) -> Result<()> {
    // 選択履歴の長さが結果ごとに異なるため可変長
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    writer.write_record(csv_header(chart))?;

    for result in results {
        let row = csv_row(chart, result).map_err(|e| ChartDiagError::ChartProcessing {
            chart: chart.name.clone(),
            message: format!("結果ID {} のCSV行構築エラー: {}", result.id, e),
        })?;
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// 写真を復号して書き出し、書き出した枚数を返す
pub fn decrypt_photos<P: PhotoStore + ?Sized>(
    results: &[StoredResult],
    photos: &P,
    output_dir: &Path,
    photo_extension: &str,
) -> Result<usize> {
    let mut count = 0;
    for result in results {
        let encrypted = match photos.read(result.id)? {
            Some(bytes) => bytes,
            None => {
                warn!(id = result.id, "photo file not found, skipping");
                continue;
            }
        };

        let key = crypto::derive_key(&result.passphrase);
        let decrypted = match crypto::decrypt(&encrypted, key.as_slice()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(id = result.id, error = %e, "photo could not be decrypted, skipping");
                continue;
            }
        };

        let path = output_dir.join(format!("{}.{}", result.id, photo_extension));
        std::fs::write(&path, decrypted)?;
        debug!(id = result.id, path = %path.display(), "decrypted photo");
        count += 1;
    }
    Ok(count)
}
