//! 保存済み結果の診断結果文章の再判定（読み取り専用）
//!
//! 集計ツールが結果CSVを作るときに使う。回答時の遷移とは別の規則:
//! - decision: 結果IDで一致
//! - single: 合計点を `[lower, upper)` で判定、point（旧タイプ）は `[lower, upper]`
//! - multi: カテゴリごとに点数を半分にして5で頭打ちにしてから、同じカテゴリの
//!   診断結果を `[lower, upper]` で判定する（表示用の変換）

use crate::error::{Error, Result};
use crate::evaluator::{diagnosis_for_score, RangeRule};
use crate::types::{CategoryPoint, ChartDocument, Diagnosis};

/// 点数データが欠けている場合の文章
pub const INCOMPLETE_TEXT: &str = "データ不完全";
/// 該当する診断結果がない場合の文章
pub const NO_DIAGNOSIS_TEXT: &str = "診断結果なし";
/// multi再判定時の点数の上限
pub const MULTI_SCALE_MAX: i64 = 5;

/// 保存済みの点数欄
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointData {
    /// 空文字または "0"
    Empty,
    Total(i64),
    PerCategory(Vec<CategoryPoint>),
}

impl PointData {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "0" {
            return Ok(PointData::Empty);
        }
        if let Ok(points) = serde_json::from_str::<Vec<CategoryPoint>>(raw) {
            return Ok(PointData::PerCategory(points));
        }
        serde_json::from_str::<i64>(raw)
            .map(PointData::Total)
            .map_err(|_| Error::InvalidResult(format!("point field cannot be parsed: {}", raw)))
    }
}

/// multi再判定用の点数変換
pub fn scale_category_point(point: i64) -> i64 {
    (point / 2).min(MULTI_SCALE_MAX)
}

/// decisionチャートの結果IDから診断結果を引く
pub fn decision_diagnosis<'c>(chart: &'c ChartDocument, result_id: &str) -> Result<&'c Diagnosis> {
    let id: i64 = result_id
        .trim()
        .parse()
        .map_err(|_| Error::InvalidResult(format!("result id '{}' is not a number", result_id)))?;
    chart
        .diagnosis(id)
        .ok_or_else(|| Error::InvalidResult(format!("diagnosis {} not found", id)))
}

/// 合計点から診断結果を引く（チャートタイプの範囲規則に従う）
pub fn total_diagnosis(chart: &ChartDocument, total: i64) -> Option<&Diagnosis> {
    diagnosis_for_score(chart, total, RangeRule::for_total(chart.chart_type))
}

/// カテゴリ点数から診断結果を引く
pub fn category_diagnosis<'c>(chart: &'c ChartDocument, category: &str, point: i64) -> Option<&'c Diagnosis> {
    let scaled = scale_category_point(point);
    chart
        .diagnoses
        .iter()
        .find(|d| d.category == category && RangeRule::Closed.contains(d, scaled))
}

/// CSVの1カテゴリ分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOutcome {
    pub category: String,
    pub point: i64,
    pub sentence: String,
}

/// チャートの全カテゴリ（設問の初出順）について点数と文章を求める
pub fn category_outcomes(chart: &ChartDocument, data: &PointData) -> Vec<CategoryOutcome> {
    chart
        .categories()
        .into_iter()
        .map(|category| {
            let (point, sentence) = match data {
                PointData::Empty => (0, INCOMPLETE_TEXT.to_string()),
                PointData::Total(total) => (*total, sentence_or_default(total_diagnosis(chart, *total))),
                PointData::PerCategory(points) => match points.iter().find(|p| p.category == category) {
                    Some(p) => (p.point, sentence_or_default(category_diagnosis(chart, category, p.point))),
                    None => (0, NO_DIAGNOSIS_TEXT.to_string()),
                },
            };
            CategoryOutcome {
                category: category.to_string(),
                point,
                sentence,
            }
        })
        .collect()
}

fn sentence_or_default(diagnosis: Option<&Diagnosis>) -> String {
    diagnosis.map_or_else(|| NO_DIAGNOSIS_TEXT.to_string(), |d| d.sentence.clone())
}
