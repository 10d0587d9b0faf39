//! チャートCSVコンパイラ
//!
//! 空行区切りの3部構成のCSVをChartDocumentに変換する。
//!
//! ```text
//! チャート名
//! タイプ (decision / single / multi / point)
//!
//! [設問ヘッダー行]
//! 設問行...
//!
//! [診断結果ヘッダー行]
//! 診断結果行...
//! ```
//!
//! 設問行:
//! - decision: `id, isLast, 設問文, 選択肢1..5, 遷移先1..5`
//! - single/multi/point: `id, isLast, カテゴリ, 設問文, 選択肢1..5, ポイント1..5`
//!
//! 診断結果行:
//! - decision: `id, lower, upper, 文章`（lower/upperは無視）または `id, 文章`
//! - single/multi/point: `id, カテゴリ, lower, upper, 文章`
//!
//! カンマ区切りのみでクォートには対応しない（文章中のカンマは表現できない）。
//! 行単位の書式エラーは全行を走査してからまとめて返す。

use crate::error::{CompileError, RowIssue, RowIssues};
use crate::types::{ChartDocument, ChartType, Diagnosis, Question, DEFAULT_CATEGORY, MAX_CHOICES, MIN_CHOICES};
use std::collections::HashSet;

/// 必要な最小行数（名前・タイプ・空行・設問・空行・診断結果の一部）
const MIN_LINES: usize = 5;

const BOM: char = '\u{feff}';

struct Line<'a> {
    number: usize,
    fields: Vec<&'a str>,
}

impl<'a> Line<'a> {
    fn new(number: usize, text: &'a str) -> Self {
        Self {
            number,
            fields: text.split(',').map(str::trim).collect(),
        }
    }

    fn is_blank(&self) -> bool {
        self.fields.iter().all(|f| f.is_empty())
    }

    fn field(&self, index: usize) -> &'a str {
        self.fields.get(index).copied().unwrap_or("")
    }

    /// 末尾の空フィールドを除いた列数
    fn width(&self) -> usize {
        self.fields.iter().rposition(|f| !f.is_empty()).map_or(0, |i| i + 1)
    }

    /// 任意のヘッダー行か（先頭フィールドが "id" で終わる）
    fn is_header(&self) -> bool {
        self.field(0).to_lowercase().ends_with("id")
    }
}

/// 設問行のパース結果（相互参照チェック用に行番号と列位置を保持）
struct QuestionRow {
    line: usize,
    question: Question,
    slots: Vec<usize>,
}

struct Issues(Vec<RowIssue>);

impl Issues {
    fn push(&mut self, line: usize, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(RowIssue {
            line,
            field: field.into(),
            message: message.into(),
        });
    }
}

/// CSVテキストをChartDocumentに変換
pub fn compile(text: &str) -> Result<ChartDocument, CompileError> {
    let normalized = text
        .trim_start_matches(BOM)
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    let lines: Vec<Line> = normalized
        .lines()
        .enumerate()
        .map(|(i, l)| Line::new(i + 1, l))
        .collect();

    if lines.len() < MIN_LINES {
        return Err(CompileError::Structural(format!(
            "at least {} lines are required, got {}",
            MIN_LINES,
            lines.len()
        )));
    }

    let mut cursor = 0;

    // ヘッダー（名前・タイプ）
    while cursor < lines.len() && lines[cursor].is_blank() {
        cursor += 1;
    }
    let (name, chart_type) = parse_header(&lines, cursor)?;
    cursor += 2;

    if cursor < lines.len() && !lines[cursor].is_blank() {
        return Err(CompileError::Structural(format!(
            "line {}: a blank line must follow the chart type",
            lines[cursor].number
        )));
    }
    cursor = skip_blank(&lines, cursor);

    // 設問セクション
    let question_rows = take_region(&lines, &mut cursor, true);
    if question_rows.is_empty() {
        return Err(CompileError::Structural("question section is missing".to_string()));
    }

    // 診断結果セクション（以降EOFまで、空行は無視）
    cursor = skip_blank(&lines, cursor);
    let diagnosis_rows = take_region(&lines, &mut cursor, false);
    if diagnosis_rows.is_empty() {
        return Err(CompileError::Structural("diagnosis section is missing".to_string()));
    }

    let mut issues = Issues(Vec::new());

    let mut parsed_questions = Vec::with_capacity(question_rows.len());
    let mut question_ids = HashSet::new();
    for line in question_rows {
        if let Some(row) = parse_question(line, chart_type, &mut issues) {
            if !question_ids.insert(row.question.id) {
                issues.push(line.number, "id", format!("duplicate question id {}", row.question.id));
            }
            parsed_questions.push(row);
        }
    }

    let mut diagnoses = Vec::with_capacity(diagnosis_rows.len());
    let mut diagnosis_ids = HashSet::new();
    for line in diagnosis_rows {
        if let Some(diagnosis) = parse_diagnosis(line, chart_type, &mut issues) {
            if !diagnosis_ids.insert(diagnosis.id) {
                issues.push(line.number, "id", format!("duplicate diagnosis id {}", diagnosis.id));
            }
            diagnoses.push(diagnosis);
        }
    }

    check_references(&parsed_questions, chart_type, &question_ids, &diagnosis_ids, &mut issues);

    if !issues.0.is_empty() {
        issues.0.sort_by_key(|i| i.line);
        return Err(CompileError::Format(RowIssues(issues.0)));
    }

    Ok(ChartDocument {
        name,
        chart_type,
        questions: parsed_questions.into_iter().map(|r| r.question).collect(),
        diagnoses,
    })
}

fn parse_header(lines: &[Line], at: usize) -> Result<(String, ChartType), CompileError> {
    let (name_line, type_line) = match (lines.get(at), lines.get(at + 1)) {
        (Some(n), Some(t)) if !n.is_blank() && !t.is_blank() => (n, t),
        _ => {
            return Err(CompileError::Structural(
                "header must consist of a chart name line and a chart type line".to_string(),
            ))
        }
    };

    let name = name_line.field(0);
    if name.is_empty() {
        return Err(CompileError::Structural(format!(
            "line {}: chart name is empty",
            name_line.number
        )));
    }

    let chart_type = type_line
        .field(0)
        .parse::<ChartType>()
        .map_err(|e| CompileError::Structural(format!("line {}: {}", type_line.number, e)))?;

    Ok((name.to_string(), chart_type))
}

fn skip_blank(lines: &[Line], mut cursor: usize) -> usize {
    while cursor < lines.len() && lines[cursor].is_blank() {
        cursor += 1;
    }
    cursor
}

/// セクションの行を取り出す。`stop_at_blank` がfalseならEOFまで（空行は読み飛ばす）
fn take_region<'l, 'a>(lines: &'l [Line<'a>], cursor: &mut usize, stop_at_blank: bool) -> Vec<&'l Line<'a>> {
    let mut rows = Vec::new();
    if *cursor < lines.len() && lines[*cursor].is_header() {
        *cursor += 1;
    }
    while *cursor < lines.len() {
        let line = &lines[*cursor];
        if line.is_blank() {
            if stop_at_blank {
                break;
            }
        } else {
            rows.push(line);
        }
        *cursor += 1;
    }
    rows
}

fn parse_id(line: &Line, index: usize, issues: &mut Issues) -> Option<i64> {
    let raw = line.field(index);
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Some(id),
        _ => {
            issues.push(line.number, "id", format!("'{}' is not a positive integer", raw));
            None
        }
    }
}

fn parse_int(line: &Line, index: usize, field: &str, issues: &mut Issues) -> Option<i64> {
    let raw = line.field(index);
    if raw.is_empty() {
        issues.push(line.number, field, "is required");
        return None;
    }
    match raw.parse::<i64>() {
        Ok(v) => Some(v),
        Err(_) => {
            issues.push(line.number, field, format!("'{}' is not a number", raw));
            None
        }
    }
}

fn parse_question(line: &Line, chart_type: ChartType, issues: &mut Issues) -> Option<QuestionRow> {
    let scored = chart_type.is_scored();
    let (sentence_col, choice_col) = if scored { (3, 4) } else { (2, 3) };
    let value_col = choice_col + MAX_CHOICES;
    let value_name = if scored { "point" } else { "next" };
    let before = issues.0.len();

    if line.width() > value_col + MAX_CHOICES {
        issues.push(
            line.number,
            "columns",
            format!("expected at most {} columns, got {}", value_col + MAX_CHOICES, line.width()),
        );
    }

    let id = parse_id(line, 0, issues);
    let is_last = line.field(1) == "1";

    let category = if scored && !line.field(2).is_empty() {
        line.field(2).to_string()
    } else {
        DEFAULT_CATEGORY.to_string()
    };

    let sentence = line.field(sentence_col);
    if sentence.is_empty() {
        issues.push(line.number, "sentence", "is empty");
    }

    let mut choices = Vec::new();
    let mut values = Vec::new();
    let mut slots = Vec::new();
    for slot in 0..MAX_CHOICES {
        let choice = line.field(choice_col + slot);
        let value_field = format!("{}{}", value_name, slot + 1);
        if choice.is_empty() {
            if !line.field(value_col + slot).is_empty() {
                issues.push(line.number, value_field, format!("given without choice{}", slot + 1));
            }
            continue;
        }
        if let Some(value) = parse_int(line, value_col + slot, &value_field, issues) {
            values.push(value);
        }
        choices.push(choice.to_string());
        slots.push(slot);
    }

    if !(MIN_CHOICES..=MAX_CHOICES).contains(&choices.len()) {
        issues.push(
            line.number,
            "choices",
            format!("{} choices given, {} to {} required", choices.len(), MIN_CHOICES, MAX_CHOICES),
        );
    }

    // 最終問題の遷移先は範囲判定で決まるためプレースホルダ
    let next = match id {
        Some(id) if scored && !is_last => id.checked_add(1).unwrap_or_else(|| {
            issues.push(line.number, "id", format!("{} is too large to be followed by another question", id));
            0
        }),
        _ => 0,
    };

    if issues.0.len() != before {
        return None;
    }
    let id = id?;

    let (nexts, points) = if scored {
        (vec![next; values.len()], Some(values))
    } else {
        (values, None)
    };

    Some(QuestionRow {
        line: line.number,
        question: Question {
            id,
            is_last,
            category,
            sentence: sentence.to_string(),
            choices,
            nexts,
            points,
        },
        slots,
    })
}

fn parse_diagnosis(line: &Line, chart_type: ChartType, issues: &mut Issues) -> Option<Diagnosis> {
    let before = issues.0.len();
    let id = parse_id(line, 0, issues);

    let (category, lower, upper, sentence) = if chart_type.is_scored() {
        if line.width() > 5 {
            issues.push(line.number, "columns", format!("expected at most 5 columns, got {}", line.width()));
        }
        let category = match line.field(1) {
            "" => DEFAULT_CATEGORY,
            c => c,
        };
        let lower = parse_int(line, 2, "lower", issues);
        let upper = parse_int(line, 3, "upper", issues);
        if let (Some(l), Some(u)) = (lower, upper) {
            if l > u {
                issues.push(line.number, "upper", format!("lower {} is greater than upper {}", l, u));
            }
        }
        (category, lower.unwrap_or(0), upper.unwrap_or(0), line.field(4))
    } else {
        let sentence = match line.width() {
            0 | 1 => "",
            2 => line.field(1),
            4 => line.field(3),
            w => {
                issues.push(
                    line.number,
                    "columns",
                    format!("expected 'id,sentence' or 'id,lower,upper,sentence', got {} columns", w),
                );
                ""
            }
        };
        (DEFAULT_CATEGORY, 0, 0, sentence)
    };

    if sentence.is_empty() && issues.0.len() == before {
        issues.push(line.number, "sentence", "is empty");
    }

    if issues.0.len() != before {
        return None;
    }

    Some(Diagnosis {
        id: id?,
        category: category.to_string(),
        lower,
        upper,
        sentence: sentence.to_string(),
    })
}

/// 遷移先の存在チェック
fn check_references(
    rows: &[QuestionRow],
    chart_type: ChartType,
    question_ids: &HashSet<i64>,
    diagnosis_ids: &HashSet<i64>,
    issues: &mut Issues,
) {
    for row in rows {
        let q = &row.question;
        if chart_type.is_scored() {
            // 次のIDが溢れる行は parse_question で報告済み
            if let Some(next) = q.id.checked_add(1) {
                if !q.is_last && !question_ids.contains(&next) {
                    issues.push(
                        row.line,
                        "id",
                        format!("question {} is not last but question {} does not exist", q.id, next),
                    );
                }
            }
            continue;
        }

        for (next, slot) in q.nexts.iter().zip(&row.slots) {
            let field = format!("next{}", slot + 1);
            if q.is_last && !diagnosis_ids.contains(next) {
                issues.push(row.line, field, format!("diagnosis {} does not exist", next));
            } else if !q.is_last && !question_ids.contains(next) {
                issues.push(row.line, field, format!("question {} does not exist", next));
            }
        }
    }
}
