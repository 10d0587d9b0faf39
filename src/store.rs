//! チャート・診断結果の保存先（SQLite）
//!
//! テーブル構成は既存のデータベースと同じ `charts` / `results`。
//!
//! # Mutex
//!
//! 接続は `Mutex` で保護する。チャート登録は件数チェック・重複チェック・挿入を
//! ロックを保持したまま1つの IMMEDIATE トランザクションで行うため、同時に登録
//! されても上限超過や同名チャートは入らない。ロックが poisoned の場合は panic する。

use crate::error::{ChartDiagError, Result};
use chart_diag_common::{ChartDocument, StoredResult};
use rusqlite::{params, Connection, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// チャートテーブルの1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRecord {
    pub id: i64,
    pub name: String,
    pub chart_type: String,
    /// チャート情報のJSON
    pub diagram: String,
}

impl ChartRecord {
    pub fn document(&self) -> Result<ChartDocument> {
        Ok(ChartDocument::from_json(&self.diagram)?)
    }
}

/// チャートの保存先
pub trait ChartStore {
    /// 保存済みチャートのJSON一覧
    fn list(&self) -> Result<Vec<String>>;
    fn list_records(&self) -> Result<Vec<ChartRecord>>;
    /// 同名チャートがある場合・上限に達している場合はエラー
    fn insert(&self, name: &str, chart_type: &str, diagram: &str) -> Result<()>;
    /// 削除した件数を返す
    fn delete_by_name(&self, name: &str) -> Result<usize>;
}

/// 診断結果の保存先
pub trait ResultStore {
    /// 採番したIDを返す
    fn insert_result(&self, result: &StoredResult) -> Result<i64>;
    /// 写真の書き出しに失敗した結果の取り消し用
    fn delete_result(&self, id: i64) -> Result<()>;
    fn results_for_chart(&self, chart_name: &str) -> Result<Vec<StoredResult>>;
}

/// コンパイル済みチャートを登録
pub fn register_chart<S: ChartStore + ?Sized>(store: &S, chart: &ChartDocument) -> Result<()> {
    let diagram = chart.to_json()?;
    store.insert(&chart.name, chart.chart_type.as_str(), &diagram)
}

/// チャートを削除（存在しなければエラー）
pub fn delete_chart<S: ChartStore + ?Sized>(store: &S, name: &str) -> Result<()> {
    match store.delete_by_name(name)? {
        0 => Err(ChartDiagError::ChartNotFound(name.to_string())),
        _ => Ok(()),
    }
}

/// SQLiteによる保存先
pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_charts: usize,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P, max_charts: usize) -> Result<Self> {
        Self::with_connection(Connection::open(path)?, max_charts)
    }

    /// メモリ上のデータベース（テスト用）
    pub fn in_memory(max_charts: usize) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, max_charts)
    }

    fn with_connection(conn: Connection, max_charts: usize) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            max_charts,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("Lock failed")
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS charts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                type TEXT,
                diagram TEXT
            );

            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT,
                passphrase TEXT,
                chart_name TEXT,
                result_id TEXT,
                point TEXT,
                choose_history TEXT
            );
            ",
        )?;
        Ok(())
    }
}

impl ChartStore for SqliteStore {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self.list_records()?.into_iter().map(|r| r.diagram).collect())
    }

    fn list_records(&self) -> Result<Vec<ChartRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name, type, diagram FROM charts ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(ChartRecord {
                id: row.get(0)?,
                name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                chart_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                diagram: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn insert(&self, name: &str, chart_type: &str, diagram: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM charts", [], |row| row.get(0))?;
        if count as usize >= self.max_charts {
            return Err(ChartDiagError::ChartLimit(self.max_charts));
        }

        let exists: i64 = tx.query_row("SELECT COUNT(*) FROM charts WHERE name = ?1", params![name], |row| {
            row.get(0)
        })?;
        if exists > 0 {
            return Err(ChartDiagError::DuplicateName(name.to_string()));
        }

        tx.execute(
            "INSERT INTO charts (name, type, diagram) VALUES (?1, ?2, ?3)",
            params![name, chart_type, diagram],
        )?;
        tx.commit()?;

        info!(chart = name, chart_type, "registered chart");
        Ok(())
    }

    fn delete_by_name(&self, name: &str) -> Result<usize> {
        let removed = self.conn().execute("DELETE FROM charts WHERE name = ?1", params![name])?;
        info!(chart = name, removed, "deleted chart");
        Ok(removed)
    }
}

impl ResultStore for SqliteStore {
    fn insert_result(&self, result: &StoredResult) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            r"
            INSERT INTO results (timestamp, passphrase, chart_name, result_id, point, choose_history)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                result.timestamp,
                result.passphrase,
                result.chart_name,
                result.result_id,
                result.point,
                result.choose_history,
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(id, chart = %result.chart_name, "saved result");
        Ok(id)
    }

    fn delete_result(&self, id: i64) -> Result<()> {
        self.conn().execute("DELETE FROM results WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn results_for_chart(&self, chart_name: &str) -> Result<Vec<StoredResult>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r"
            SELECT id, timestamp, passphrase, chart_name, result_id, point, choose_history
            FROM results WHERE chart_name = ?1 ORDER BY id
            ",
        )?;
        let rows = stmt.query_map(params![chart_name], |row| {
            let text = |i: usize| -> rusqlite::Result<String> { Ok(row.get::<_, Option<String>>(i)?.unwrap_or_default()) };
            Ok(StoredResult {
                id: row.get(0)?,
                timestamp: text(1)?,
                passphrase: text(2)?,
                chart_name: text(3)?,
                result_id: text(4)?,
                point: text(5)?,
                choose_history: text(6)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
