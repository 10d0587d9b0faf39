//! 対話式の回答
//!
//! 登録済みチャートに端末上で回答する。回答ごとに状態ファイルへ保存するので、
//! 中断しても同じチャートを指定すれば続きから再開できる。
//! 状態ファイルは結果の保存が成功してから消す。

use crate::error::{ChartDiagError, Result};
use crate::photo_store::PhotoStore;
use crate::run_file::RunFile;
use crate::save;
use crate::store::{ChartStore, ResultStore};
use chart_diag_common::{ChartDocument, Diagnosis, EvalError, RunState, RunStateRepository, Score, Session};
use dialoguer::Select;
use std::path::Path;

/// 登録済みチャートを名前で探す
pub fn find_chart<S: ChartStore + ?Sized>(store: &S, name: &str) -> Result<ChartDocument> {
    store
        .list_records()?
        .into_iter()
        .find(|r| r.name == name)
        .ok_or_else(|| ChartDiagError::ChartNotFound(name.to_string()))?
        .document()
}

/// 現在の設問の表示文と選択肢
pub fn question_prompt(chart: &ChartDocument, state: &RunState) -> Result<(String, Vec<String>)> {
    let id = state
        .current_question_id()
        .ok_or_else(|| EvalError::AlreadyCompleted(state.diagnosis_id().unwrap_or_default()))?;
    let question = chart.question(id).ok_or(EvalError::UnknownQuestion(id))?;
    let prompt = format!("Q{} {}", state.history.len() + 1, question.sentence);
    Ok((prompt, question.choices.clone()))
}

/// 完了時の表示文
pub fn describe_outcome(diagnosis: Option<&Diagnosis>, state: &RunState) -> String {
    let sentence = diagnosis.map_or("（該当する診断結果がありません）", |d| d.sentence.as_str());
    match &state.score {
        Score::None => format!("診断結果: {}", sentence),
        Score::Total(total) => format!("診断結果: {} ({}点)", sentence, total),
        Score::PerCategory(points) => {
            let detail: Vec<String> = points.iter().map(|p| format!("{}: {}点", p.category, p.point)).collect();
            format!("診断結果: {} ({})", sentence, detail.join(", "))
        }
    }
}

/// 対話式で回答し、完了したら保存して結果IDを返す（中断したら `None`）
pub fn run_interactive<S, P>(
    store: &S,
    photos: &P,
    chart_name: &str,
    photo: Option<&Path>,
    run_file: RunFile,
    passphrase_length: usize,
) -> Result<Option<i64>>
where
    S: ChartStore + ResultStore + ?Sized,
    P: PhotoStore + ?Sized,
{
    let chart = find_chart(store, chart_name)?;
    let timestamp = chrono::Utc::now().to_rfc3339();
    let mut session = Session::resume_or_start(&chart, run_file, timestamp)?;

    if !session.state().history.is_empty() {
        println!("前回の続きから再開します（回答済み {}問）", session.state().history.len());
    }
    if let Some(path) = photo {
        session.attach_photo(std::fs::read(path)?)?;
    }

    println!("📋 {} ({})\n", chart.name, chart.chart_type);

    if session.state().is_completed() {
        println!("前回の回答は完了済みです。保存をやり直します");
    }

    while !session.state().is_completed() {
        let (prompt, choices) = question_prompt(&chart, session.state())?;
        let selected = Select::new()
            .with_prompt(prompt)
            .items(&choices)
            .default(0)
            .interact_opt()
            .map_err(|e| ChartDiagError::Prompt(e.to_string()))?;

        let Some(choice) = selected else {
            println!("中断しました。同じコマンドで再開できます");
            return Ok(None);
        };

        session.answer(choice)?;
    }

    let state = session.state();
    let diagnosis = state.diagnosis_id().and_then(|id| chart.diagnosis(id));
    println!("\n{}", describe_outcome(diagnosis, state));

    let id = save_completed(store, photos, session, passphrase_length)?;
    println!("✔ 結果を保存しました (ID: {})", id);
    Ok(Some(id))
}

/// 完了したセッションを保存し、成功したら状態を消去する
///
/// 保存に失敗した場合は状態が残り、次回の実行で保存をやり直せる。
pub fn save_completed<S, P, R>(results: &S, photos: &P, session: Session<'_, R>, passphrase_length: usize) -> Result<i64>
where
    S: ResultStore + ?Sized,
    P: PhotoStore + ?Sized,
    R: RunStateRepository,
{
    let id = save::save_run(results, photos, session.state(), passphrase_length)?;
    session.finish()?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo_store::PhotoDir;
    use crate::store::{register_chart, SqliteStore};
    use chart_diag_common::{compile, evaluator, CategoryPoint, StoredResult};
    use tempfile::tempdir;

    const CSV: &str = "\
かんたん診断
decision

1,0,朝型ですか,はい,いいえ,,,,2,2,,,
2,1,コーヒーは好きですか,はい,いいえ,,,,1,2,,,

1,早起きコーヒー派
2,その他
";

    #[test]
    fn test_find_chart() {
        let store = SqliteStore::in_memory(3).unwrap();
        register_chart(&store, &compile(CSV).unwrap()).unwrap();
        assert_eq!(find_chart(&store, "かんたん診断").unwrap().questions.len(), 2);
        assert!(matches!(find_chart(&store, "なし"), Err(ChartDiagError::ChartNotFound(_))));
    }

    #[test]
    fn test_question_prompt() {
        let chart = compile(CSV).unwrap();
        let state = evaluator::start(&chart, "t").unwrap();
        let (prompt, choices) = question_prompt(&chart, &state).unwrap();
        assert_eq!(prompt, "Q1 朝型ですか");
        assert_eq!(choices, vec!["はい", "いいえ"]);

        let state = evaluator::answer(&chart, &state, 0).unwrap().state;
        assert_eq!(question_prompt(&chart, &state).unwrap().0, "Q2 コーヒーは好きですか");

        let state = evaluator::answer(&chart, &state, 0).unwrap().state;
        assert!(question_prompt(&chart, &state).is_err());
    }

    #[test]
    fn test_describe_outcome() {
        let chart = compile(CSV).unwrap();
        let mut state = evaluator::start(&chart, "t").unwrap();
        assert_eq!(describe_outcome(chart.diagnosis(1), &state), "診断結果: 早起きコーヒー派");

        state.score = Score::Total(7);
        assert_eq!(describe_outcome(None, &state), "診断結果: （該当する診断結果がありません） (7点)");

        state.score = Score::PerCategory(vec![CategoryPoint {
            category: "心".to_string(),
            point: 3,
        }]);
        assert_eq!(describe_outcome(chart.diagnosis(2), &state), "診断結果: その他 (心: 3点)");
    }

    /// 常に失敗する結果の保存先
    struct LockedResults;

    impl ResultStore for LockedResults {
        fn insert_result(&self, _result: &StoredResult) -> Result<i64> {
            Err(ChartDiagError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "database is locked",
            )))
        }

        fn delete_result(&self, _id: i64) -> Result<()> {
            Ok(())
        }

        fn results_for_chart(&self, _chart_name: &str) -> Result<Vec<StoredResult>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_failed_save_keeps_run_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let chart = compile(CSV).unwrap();
        let photos = PhotoDir::new(dir.path().join("photos"));
        let run_file = RunFile::in_dir(dir.path());

        let mut session = Session::resume_or_start(&chart, run_file.clone(), "t").unwrap();
        session.answer(0).unwrap();
        session.answer(1).unwrap();
        assert!(run_file.exists());

        assert!(save_completed(&LockedResults, &photos, session, 32).is_err());
        assert!(run_file.exists());

        // 次回は完了状態から保存し直す
        let store = SqliteStore::in_memory(3).unwrap();
        let session = Session::resume_or_start(&chart, run_file.clone(), "later").unwrap();
        assert!(session.state().is_completed());
        assert_eq!(session.state().timestamp, "t");

        let id = save_completed(&store, &photos, session, 32).unwrap();
        assert!(!run_file.exists());
        let results = store.results_for_chart("かんたん診断").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!((results[0].id, results[0].result_id.as_str()), (id, "2"));
    }
}
