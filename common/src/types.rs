//! チャートの型定義
//!
//! UIとバックエンド間でやり取りされ、チャート情報としてそのまま保存される
//! JSON形状（`choises` などの綴りも含めて）に合わせている。
//! - ChartDocument: チャート全体（設問・診断結果・タイプ）
//! - HistoryEntry / CategoryPoint: 実施結果の選択履歴とカテゴリ別点数
//! - StoredResult: 保存済みの診断結果レコード

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// カテゴリ未指定時の値
pub const DEFAULT_CATEGORY: &str = "default";

/// 1設問あたりの選択肢数の範囲
pub const MIN_CHOICES: usize = 2;
pub const MAX_CHOICES: usize = 5;

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// チャートタイプ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartType {
    /// 選択肢が次の設問または診断結果IDを直接指す
    #[serde(rename = "decision")]
    Decision,
    /// 単一の合計点で判定（範囲は下限以上・上限未満）
    #[serde(rename = "single")]
    Single,
    /// カテゴリ別の合計点
    #[serde(rename = "multi")]
    Multi,
    /// 旧pointタイプ。singleと同じだが範囲は上限を含む
    #[serde(rename = "point")]
    LegacyPoint,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Decision => "decision",
            ChartType::Single => "single",
            ChartType::Multi => "multi",
            ChartType::LegacyPoint => "point",
        }
    }

    /// 点数を積み上げるタイプか（設問は id+1 で順に進む）
    pub fn is_scored(&self) -> bool {
        !matches!(self, ChartType::Decision)
    }
}

impl FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "decision" => Ok(ChartType::Decision),
            "single" => Ok(ChartType::Single),
            "multi" => Ok(ChartType::Multi),
            "point" => Ok(ChartType::LegacyPoint),
            _ => Err(format!("Unknown chart type: {}. Use decision, single or multi", s)),
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 設問
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    /// trueなら最終問題（nextsは診断結果IDを指す）
    pub is_last: bool,
    #[serde(default = "default_category")]
    pub category: String,
    pub sentence: String,
    #[serde(rename = "choises")]
    pub choices: Vec<String>,
    pub nexts: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<i64>>,
}

/// 診断結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub id: i64,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub lower: i64,
    #[serde(default)]
    pub upper: i64,
    pub sentence: String,
}

/// チャート全体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub questions: Vec<Question>,
    pub diagnoses: Vec<Diagnosis>,
}

impl ChartDocument {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn question(&self, id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn diagnosis(&self, id: i64) -> Option<&Diagnosis> {
        self.diagnoses.iter().find(|d| d.id == id)
    }

    /// 開始設問（ID順ではなくリストの先頭）
    pub fn first_question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// 設問カテゴリの一覧（重複除去、初出順）
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for question in &self.questions {
            if !categories.contains(&question.category.as_str()) {
                categories.push(question.category.as_str());
            }
        }
        categories
    }
}

/// 選択履歴の1件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub question_id: i64,
    #[serde(rename = "choise")]
    pub choice: usize,
}

/// カテゴリ別の点数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPoint {
    pub category: String,
    pub point: i64,
}

/// 保存済みの診断結果
///
/// `point` と `choose_history` はJSON文字列のまま保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: i64,
    pub timestamp: String,
    /// 写真暗号化用パスフレーズ（平文）
    pub passphrase: String,
    pub chart_name: String,
    pub result_id: String,
    pub point: String,
    pub choose_history: String,
}

impl StoredResult {
    pub fn history(&self) -> serde_json::Result<Vec<HistoryEntry>> {
        serde_json::from_str(&self.choose_history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "name": "体調チェック",
            "type": "decision",
            "questions": [
                {"id": 1, "isLast": false, "sentence": "熱はありますか", "choises": ["はい", "いいえ"], "nexts": [2, 3]},
                {"id": 2, "isLast": true, "category": "default", "sentence": "咳は出ますか", "choises": ["はい", "いいえ"], "nexts": [10, 11]}
            ],
            "diagnoses": [
                {"id": 10, "lower": 0, "upper": 0, "sentence": "受診してください"},
                {"id": 11, "sentence": "様子を見ましょう"}
            ]
        }"#
    }

    #[test]
    fn test_chart_deserialize_wire_shape() {
        let chart = ChartDocument::from_json(sample_json()).expect("デシリアライズ失敗");
        assert_eq!(chart.name, "体調チェック");
        assert_eq!(chart.chart_type, ChartType::Decision);
        assert_eq!(chart.questions[0].category, DEFAULT_CATEGORY);
        assert_eq!(chart.questions[0].choices, vec!["はい", "いいえ"]);
        assert_eq!(chart.questions[1].points, None);
        assert_eq!(chart.diagnoses[1].category, DEFAULT_CATEGORY);
        assert_eq!(chart.diagnoses[1].upper, 0);
    }

    #[test]
    fn test_chart_serialize_keeps_wire_keys() {
        let chart = ChartDocument::from_json(sample_json()).unwrap();
        let json = chart.to_json().expect("シリアライズ失敗");
        assert!(json.contains("\"type\":\"decision\""));
        assert!(json.contains("\"choises\""));
        assert!(json.contains("\"isLast\":false"));
        assert!(!json.contains("\"points\""));
    }

    #[test]
    fn test_chart_type_parse() {
        assert_eq!("single".parse::<ChartType>(), Ok(ChartType::Single));
        assert_eq!(" Multi ".parse::<ChartType>(), Ok(ChartType::Multi));
        assert_eq!("point".parse::<ChartType>(), Ok(ChartType::LegacyPoint));
        assert!("tree".parse::<ChartType>().is_err());
        assert_eq!(ChartType::LegacyPoint.to_string(), "point");
        assert!(!ChartType::Decision.is_scored());
    }

    #[test]
    fn test_lookup_helpers() {
        let chart = ChartDocument::from_json(sample_json()).unwrap();
        assert_eq!(chart.first_question().map(|q| q.id), Some(1));
        assert!(chart.question(2).is_some());
        assert!(chart.question(3).is_none());
        assert_eq!(chart.diagnosis(11).map(|d| d.sentence.as_str()), Some("様子を見ましょう"));
    }

    #[test]
    fn test_categories_first_occurrence_order() {
        let mut chart = ChartDocument::from_json(sample_json()).unwrap();
        chart.questions[0].category = "B".to_string();
        chart.questions[1].category = "A".to_string();
        chart.questions.push(Question {
            id: 3,
            category: "B".to_string(),
            ..chart.questions[0].clone()
        });
        assert_eq!(chart.categories(), vec!["B", "A"]);
    }

    #[test]
    fn test_history_wire_shape() {
        let entry = HistoryEntry { question_id: 3, choice: 1 };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"questionId":3,"choise":1}"#);

        let stored = StoredResult {
            choose_history: r#"[{"questionId":1,"choise":0},{"questionId":3,"choise":2}]"#.to_string(),
            ..Default::default()
        };
        let history = stored.history().expect("履歴のパース失敗");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], HistoryEntry { question_id: 3, choice: 2 });
    }
}
