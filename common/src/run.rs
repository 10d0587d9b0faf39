//! 回答セッションの保持と保存形式
//!
//! - RunStateWire: クライアントが保持し、完了時に送信するJSON形状
//! - RunStateRepository: 途中状態の保存先（呼び出し側が所有）
//! - Session: 開始時に読み込み、遷移ごとに保存し、結果の保存後に `finish` で消去する
//! - StoredResult への変換（写真の暗号化は呼び出し側）

use crate::error::{Error, Result};
use crate::evaluator::{self, Progress, RunState, Score};
use crate::types::{CategoryPoint, ChartDocument, ChartType, Diagnosis, HistoryEntry, StoredResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 回答セッションのJSON形状
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStateWire {
    pub chart_name: String,
    pub chart_type: ChartType,
    pub timestamp: String,
    /// JPEGのBase64
    #[serde(default)]
    pub photo: String,
    #[serde(rename = "currentQId", default, skip_serializing_if = "Option::is_none")]
    pub current_q_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_point: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_points: Option<Vec<CategoryPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_id: Option<i64>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl RunState {
    pub fn to_wire(&self) -> RunStateWire {
        let (current_point, current_points) = match &self.score {
            Score::None => (None, None),
            Score::Total(total) => (Some(*total), None),
            Score::PerCategory(points) => (None, Some(points.clone())),
        };
        RunStateWire {
            chart_name: self.chart_name.clone(),
            chart_type: self.chart_type,
            timestamp: self.timestamp.clone(),
            photo: STANDARD.encode(&self.photo),
            current_q_id: self.current_question_id(),
            current_point,
            current_points,
            diagnosis_id: self.diagnosis_id(),
            history: self.history.clone(),
        }
    }

    pub fn from_wire(wire: RunStateWire) -> Result<Self> {
        let progress = match (wire.diagnosis_id, wire.current_q_id) {
            (Some(diagnosis_id), _) => Progress::Completed { diagnosis_id },
            (None, Some(question_id)) => Progress::InProgress { question_id },
            (None, None) => {
                return Err(Error::InvalidRun(
                    "either currentQId or diagnosisId is required".to_string(),
                ))
            }
        };

        let score = match wire.chart_type {
            ChartType::Decision => Score::None,
            ChartType::Single | ChartType::LegacyPoint => Score::Total(wire.current_point.unwrap_or(0)),
            ChartType::Multi => Score::PerCategory(wire.current_points.unwrap_or_default()),
        };

        let photo = if wire.photo.is_empty() {
            Vec::new()
        } else {
            STANDARD
                .decode(wire.photo.as_bytes())
                .map_err(|e| Error::InvalidRun(format!("photo is not valid base64: {}", e)))?
        };

        Ok(Self {
            chart_name: wire.chart_name,
            chart_type: wire.chart_type,
            timestamp: wire.timestamp,
            photo,
            progress,
            score,
            history: wire.history,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_wire(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_wire())?)
    }

    /// 完了済みのセッションを保存レコードに変換（IDは保存時に採番）
    ///
    /// 点数欄は single/point なら整数、multi ならカテゴリ別の配列、decision なら空文字。
    pub fn to_stored(&self, passphrase: &str) -> Result<StoredResult> {
        let diagnosis_id = self
            .diagnosis_id()
            .ok_or_else(|| Error::InvalidRun(format!("run of chart '{}' is not completed", self.chart_name)))?;

        let point = match &self.score {
            Score::None => String::new(),
            Score::Total(total) => serde_json::to_string(total)?,
            Score::PerCategory(points) => serde_json::to_string(points)?,
        };

        Ok(StoredResult {
            id: 0,
            timestamp: self.timestamp.clone(),
            passphrase: passphrase.to_string(),
            chart_name: self.chart_name.clone(),
            result_id: diagnosis_id.to_string(),
            point,
            choose_history: serde_json::to_string(&self.history)?,
        })
    }
}

/// 途中状態の保存先
pub trait RunStateRepository {
    fn load(&self) -> Result<Option<RunState>>;
    fn save(&mut self, state: &RunState) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

impl<R: RunStateRepository + ?Sized> RunStateRepository for &mut R {
    fn load(&self) -> Result<Option<RunState>> {
        (**self).load()
    }

    fn save(&mut self, state: &RunState) -> Result<()> {
        (**self).save(state)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}

/// メモリ上の保存先
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Option<RunState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: RunState) -> Self {
        Self { state: Some(state) }
    }
}

impl RunStateRepository for MemoryRepository {
    fn load(&self) -> Result<Option<RunState>> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &RunState) -> Result<()> {
        self.state = Some(state.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.state = None;
        Ok(())
    }
}

/// 回答セッションの駆動
pub struct Session<'c, R: RunStateRepository> {
    chart: &'c ChartDocument,
    repository: R,
    state: RunState,
}

impl<'c, R: RunStateRepository> Session<'c, R> {
    /// 保存済みの状態があれば再開、なければ新規に開始して保存する
    ///
    /// 別のチャートの状態は再開せずに破棄する。完了済みでまだ `finish` されていない
    /// 状態はそのまま再開する（結果の保存に失敗した回答を失わないため）。
    pub fn resume_or_start(chart: &'c ChartDocument, mut repository: R, timestamp: impl Into<String>) -> Result<Self> {
        let resumed = repository
            .load()?
            .filter(|s| s.chart_name == chart.name && s.chart_type == chart.chart_type);

        let state = match resumed {
            Some(state) => {
                debug!(chart = %chart.name, answered = state.history.len(), "resuming run");
                state
            }
            None => {
                let state = evaluator::start(chart, timestamp)?;
                repository.save(&state)?;
                state
            }
        };

        Ok(Self {
            chart,
            repository,
            state,
        })
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn chart(&self) -> &'c ChartDocument {
        self.chart
    }

    /// 撮影データを添付して保存
    pub fn attach_photo(&mut self, photo: Vec<u8>) -> Result<()> {
        self.state.photo = photo;
        self.repository.save(&self.state)
    }

    /// 回答して保存し、完了したら診断結果を返す
    ///
    /// 完了した状態も保存先に残る。消去は `finish` で行う。
    pub fn answer(&mut self, choice: usize) -> Result<Option<&'c Diagnosis>> {
        let transition = evaluator::answer(self.chart, &self.state, choice)?;
        self.state = transition.state;
        self.repository.save(&self.state)?;
        Ok(transition.diagnosis)
    }

    /// 完了済みの状態を保存先から消去して返す。結果の保存が確定してから呼ぶ
    pub fn finish(mut self) -> Result<RunState> {
        if !self.state.is_completed() {
            return Err(Error::InvalidRun(format!(
                "run of chart '{}' is not completed",
                self.state.chart_name
            )));
        }
        self.repository.clear()?;
        Ok(self.state)
    }
}
