//! 暗号化済み写真の保存先
//!
//! ファイル名は診断結果のID（拡張子なし）。

use crate::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub trait PhotoStore {
    fn write(&self, id: i64, encrypted: &[u8]) -> Result<()>;
    /// 写真がなければ `None`
    fn read(&self, id: i64) -> Result<Option<Vec<u8>>>;
}

/// ディレクトリに1件1ファイルで保存
#[derive(Debug, Clone)]
pub struct PhotoDir {
    root: PathBuf,
}

impl PhotoDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: i64) -> PathBuf {
        self.root.join(id.to_string())
    }
}

impl PhotoStore for PhotoDir {
    fn write(&self, id: i64, encrypted: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.path_for(id), encrypted)?;
        Ok(())
    }

    fn read(&self, id: i64) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
