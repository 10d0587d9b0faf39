//! チャート評価エンジン
//!
//! 現在の状態と選択肢番号から次の状態を求める純粋関数。
//!
//! - decision: 選択肢の遷移先が次の設問ID（最終問題なら診断結果ID）
//! - single: 合計点を積み上げ、最終問題で `[lower, upper)` に入る診断結果
//! - multi: カテゴリ別に積み上げ、最終問題では `nexts` の値をそのまま診断結果IDとする
//! - point（旧タイプ）: singleと同じだが範囲は `[lower, upper]`
//!
//! 設問グラフの循環は検出しない（遷移回数の上限もない）。

use crate::error::EvalError;
use crate::types::{CategoryPoint, ChartDocument, ChartType, Diagnosis, HistoryEntry, Question};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 点数の範囲判定ルール
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRule {
    /// 下限以上・上限未満（single）
    HalfOpen,
    /// 下限以上・上限以下（旧pointタイプ、multiの再分類）
    Closed,
}

impl RangeRule {
    pub fn contains(&self, diagnosis: &Diagnosis, score: i64) -> bool {
        match self {
            RangeRule::HalfOpen => diagnosis.lower <= score && score < diagnosis.upper,
            RangeRule::Closed => diagnosis.lower <= score && score <= diagnosis.upper,
        }
    }

    /// 合計点で判定するときのルール
    pub fn for_total(chart_type: ChartType) -> Self {
        match chart_type {
            ChartType::Single | ChartType::Decision => RangeRule::HalfOpen,
            ChartType::LegacyPoint | ChartType::Multi => RangeRule::Closed,
        }
    }
}

/// 範囲に入る最初の診断結果（リスト順）
pub fn diagnosis_for_score(chart: &ChartDocument, score: i64, rule: RangeRule) -> Option<&Diagnosis> {
    chart.diagnoses.iter().find(|d| rule.contains(d, score))
}

/// 累積点数。チャートタイプごとに形が決まっている
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    /// decision（点数なし）
    None,
    /// single / point
    Total(i64),
    /// multi（カテゴリ初出順）
    PerCategory(Vec<CategoryPoint>),
}

impl Score {
    /// タイプに応じた初期値
    pub fn zero(chart_type: ChartType) -> Self {
        match chart_type {
            ChartType::Decision => Score::None,
            ChartType::Single | ChartType::LegacyPoint => Score::Total(0),
            ChartType::Multi => Score::PerCategory(Vec::new()),
        }
    }

    /// カテゴリの現在点（未出現なら0）
    pub fn category_point(&self, category: &str) -> i64 {
        match self {
            Score::PerCategory(points) => points
                .iter()
                .find(|p| p.category == category)
                .map_or(0, |p| p.point),
            _ => 0,
        }
    }

    fn matches(&self, chart_type: ChartType) -> bool {
        matches!(
            (chart_type, self),
            (ChartType::Decision, Score::None)
                | (ChartType::Single | ChartType::LegacyPoint, Score::Total(_))
                | (ChartType::Multi, Score::PerCategory(_))
        )
    }
}

/// 進行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Progress {
    InProgress { question_id: i64 },
    Completed { diagnosis_id: i64 },
}

impl Progress {
    pub fn is_completed(&self) -> bool {
        matches!(self, Progress::Completed { .. })
    }
}

/// 1人分の回答セッション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub chart_name: String,
    pub chart_type: ChartType,
    /// 開始時刻（ISO8601）
    pub timestamp: String,
    /// 撮影データ。保存時に暗号化されるまでの間だけ保持する
    pub photo: Vec<u8>,
    pub progress: Progress,
    pub score: Score,
    pub history: Vec<HistoryEntry>,
}

impl RunState {
    pub fn is_completed(&self) -> bool {
        self.progress.is_completed()
    }

    pub fn current_question_id(&self) -> Option<i64> {
        match self.progress {
            Progress::InProgress { question_id } => Some(question_id),
            Progress::Completed { .. } => None,
        }
    }

    pub fn diagnosis_id(&self) -> Option<i64> {
        match self.progress {
            Progress::Completed { diagnosis_id } => Some(diagnosis_id),
            Progress::InProgress { .. } => None,
        }
    }
}

/// 遷移結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<'c> {
    pub state: RunState,
    /// 完了時に表示する診断結果
    pub diagnosis: Option<&'c Diagnosis>,
}

/// チャートの先頭設問（リスト順）から開始
pub fn start(chart: &ChartDocument, timestamp: impl Into<String>) -> Result<RunState, EvalError> {
    let first = chart.first_question().ok_or(EvalError::EmptyChart)?;
    Ok(RunState {
        chart_name: chart.name.clone(),
        chart_type: chart.chart_type,
        timestamp: timestamp.into(),
        photo: Vec::new(),
        progress: Progress::InProgress { question_id: first.id },
        score: Score::zero(chart.chart_type),
        history: Vec::new(),
    })
}

/// 選択肢 `choice`（0始まり）に回答して次の状態を返す
///
/// 入力の `state` は変更しない。同じ入力からは常に同じ結果になる。
pub fn answer<'c>(chart: &'c ChartDocument, state: &RunState, choice: usize) -> Result<Transition<'c>, EvalError> {
    let question_id = match state.progress {
        Progress::InProgress { question_id } => question_id,
        Progress::Completed { diagnosis_id } => return Err(EvalError::AlreadyCompleted(diagnosis_id)),
    };
    if state.chart_type != chart.chart_type || !state.score.matches(chart.chart_type) {
        return Err(mismatch(chart.chart_type, state.chart_type));
    }

    let question = chart
        .question(question_id)
        .ok_or(EvalError::UnknownQuestion(question_id))?;

    if choice >= question.choices.len() {
        return Err(EvalError::InvalidChoice {
            question_id,
            choice,
            count: question.choices.len(),
        });
    }

    let mut next = state.clone();
    next.history.push(HistoryEntry { question_id, choice });

    let diagnosis = match chart.chart_type {
        ChartType::Decision => step_decision(chart, question, choice, &mut next)?,
        ChartType::Single => step_total(chart, question, choice, RangeRule::HalfOpen, &mut next)?,
        ChartType::LegacyPoint => step_total(chart, question, choice, RangeRule::Closed, &mut next)?,
        ChartType::Multi => step_multi(chart, question, choice, &mut next)?,
    };

    debug!(
        chart = %chart.name,
        question_id,
        choice,
        progress = ?next.progress,
        "transition"
    );

    Ok(Transition { state: next, diagnosis })
}

fn mismatch(chart: ChartType, run: ChartType) -> EvalError {
    EvalError::ChartTypeMismatch {
        chart: chart.to_string(),
        run: run.to_string(),
    }
}

fn target(question: &Question, choice: usize) -> Result<i64, EvalError> {
    question.nexts.get(choice).copied().ok_or(EvalError::InvalidChoice {
        question_id: question.id,
        choice,
        count: question.nexts.len(),
    })
}

/// 選択肢の点数。points がなければ選択肢の位置（1始まり）
fn delta(question: &Question, choice: usize) -> Result<i64, EvalError> {
    match &question.points {
        Some(points) => points.get(choice).copied().ok_or(EvalError::InvalidChoice {
            question_id: question.id,
            choice,
            count: points.len(),
        }),
        None => Ok(choice as i64 + 1),
    }
}

/// 採点式チャートの次の設問ID
fn following(question: &Question) -> Result<i64, EvalError> {
    question.id.checked_add(1).ok_or(EvalError::NoFollowingQuestion(question.id))
}

fn step_decision<'c>(
    chart: &'c ChartDocument,
    question: &Question,
    choice: usize,
    state: &mut RunState,
) -> Result<Option<&'c Diagnosis>, EvalError> {
    let target = target(question, choice)?;

    if question.is_last {
        let diagnosis = chart.diagnosis(target).ok_or(EvalError::DiagnosisNotFound(target))?;
        state.progress = Progress::Completed { diagnosis_id: target };
        Ok(Some(diagnosis))
    } else {
        chart.question(target).ok_or(EvalError::QuestionNotFound(target))?;
        state.progress = Progress::InProgress { question_id: target };
        Ok(None)
    }
}

fn step_total<'c>(
    chart: &'c ChartDocument,
    question: &Question,
    choice: usize,
    rule: RangeRule,
    state: &mut RunState,
) -> Result<Option<&'c Diagnosis>, EvalError> {
    let delta = delta(question, choice)?;
    let Score::Total(total) = &mut state.score else {
        return Err(mismatch(chart.chart_type, state.chart_type));
    };
    *total = total.checked_add(delta).ok_or(EvalError::ScoreOverflow { question_id: question.id })?;
    let total = *total;

    if question.is_last {
        let diagnosis = diagnosis_for_score(chart, total, rule).ok_or(EvalError::NoDiagnosisForScore(total))?;
        state.progress = Progress::Completed { diagnosis_id: diagnosis.id };
        Ok(Some(diagnosis))
    } else {
        state.progress = Progress::InProgress { question_id: following(question)? };
        Ok(None)
    }
}

fn step_multi<'c>(
    chart: &'c ChartDocument,
    question: &Question,
    choice: usize,
    state: &mut RunState,
) -> Result<Option<&'c Diagnosis>, EvalError> {
    let delta = delta(question, choice)?;
    if let Score::PerCategory(points) = &mut state.score {
        match points.iter_mut().find(|p| p.category == question.category) {
            Some(entry) => {
                entry.point = entry
                    .point
                    .checked_add(delta)
                    .ok_or(EvalError::ScoreOverflow { question_id: question.id })?;
            }
            None => points.push(CategoryPoint {
                category: question.category.clone(),
                point: delta,
            }),
        }
    }

    if question.is_last {
        let diagnosis_id = target(question, choice)?;
        state.progress = Progress::Completed { diagnosis_id };
        Ok(chart.diagnosis(diagnosis_id))
    } else {
        state.progress = Progress::InProgress { question_id: following(question)? };
        Ok(None)
    }
}
