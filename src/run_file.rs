//! 回答途中の状態ファイル
//!
//! 回答ごとに状態をJSONで書き出し、中断しても同じチャートなら続きから再開する。
//! 完了した回答は結果の保存が成功してから削除する。

use chart_diag_common::{Error, Result, RunState, RunStateRepository, RunStateWire};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::warn;

const RUN_FILE_NAME: &str = ".chart-run.json";

/// 状態ファイルの構造
#[derive(Debug, Serialize, Deserialize)]
struct RunFileContent {
    /// バージョン（互換性チェック用）
    version: u32,
    run: RunStateWire,
}

#[derive(Debug, Clone)]
pub struct RunFile {
    path: PathBuf,
}

impl RunFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// ディレクトリ直下の既定ファイル名
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(RUN_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

fn repository_error(e: impl std::fmt::Display) -> Error {
    Error::Repository(e.to_string())
}

impl RunStateRepository for RunFile {
    /// 壊れたファイルやバージョン違いは無視して新規扱い
    fn load(&self) -> Result<Option<RunState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path).map_err(repository_error)?;
        let content: RunFileContent = match serde_json::from_reader(BufReader::new(file)) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable run file");
                return Ok(None);
            }
        };

        if content.version != Self::CURRENT_VERSION {
            warn!(path = %self.path.display(), version = content.version, "run file version mismatch");
            return Ok(None);
        }

        RunState::from_wire(content.run).map(Some)
    }

    fn save(&mut self, state: &RunState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(repository_error)?;
        }
        let file = File::create(&self.path).map_err(repository_error)?;
        let content = RunFileContent {
            version: Self::CURRENT_VERSION,
            run: state.to_wire(),
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &content)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(repository_error(e)),
        }
    }
}
