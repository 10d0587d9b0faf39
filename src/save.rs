//! 完了した回答セッションの保存
//!
//! パスフレーズを生成して写真を暗号化し、診断結果を登録してから
//! 暗号化済み写真を結果IDのファイル名で書き出す。
//! 写真の書き出しに失敗したら登録した結果を取り消す。

use crate::error::Result;
use crate::photo_store::PhotoStore;
use crate::store::ResultStore;
use chart_diag_common::crypto;
use chart_diag_common::RunState;
use tracing::{info, warn};

/// 保存してIDを返す
pub fn save_run<S, P>(results: &S, photos: &P, state: &RunState, passphrase_length: usize) -> Result<i64>
where
    S: ResultStore + ?Sized,
    P: PhotoStore + ?Sized,
{
    let passphrase = crypto::generate_passphrase(passphrase_length)?;
    let key = crypto::derive_key(&passphrase);
    let encrypted = crypto::encrypt(&state.photo, key.as_slice())?;

    let record = state.to_stored(&passphrase)?;
    let id = results.insert_result(&record)?;
    if let Err(e) = photos.write(id, &encrypted) {
        warn!(id, error = %e, "photo write failed, removing result");
        results.delete_result(id)?;
        return Err(e);
    }

    info!(id, chart = %state.chart_name, photo_bytes = state.photo.len(), "saved run");
    Ok(id)
}

/// クライアントから送られたJSONを保存
pub fn save_run_json<S, P>(results: &S, photos: &P, json: &str, passphrase_length: usize) -> Result<i64>
where
    S: ResultStore + ?Sized,
    P: PhotoStore + ?Sized,
{
    let state = RunState::from_json(json)?;
    save_run(results, photos, &state, passphrase_length)
}
