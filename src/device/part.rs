//! `.part` 临时文件：首个数据块到达时才创建，完整写入后原子重命名

use super::PART_SUFFIX;
use crate::error::SyncError;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

pub struct PartFile {
    part_path: PathBuf,
    final_path: PathBuf,
    file: Option<File>,
    written: u64,
}

impl PartFile {
    pub fn new(dest_dir: &Path, name: &str) -> Self {
        Self {
            part_path: dest_dir.join(format!("{}{}", name, PART_SUFFIX)),
            final_path: dest_dir.join(name),
            file: None,
            written: 0,
        }
    }

    pub fn part_path(&self) -> &Path {
        &self.part_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SyncError> {
        if chunk.is_empty() {
            return Ok(());
        }
        if self.file.is_none() {
            let file = File::create(&self.part_path)
                .await
                .map_err(|e| SyncError::local_io(&self.part_path, e))?;
            self.file = Some(file);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(chunk)
                .await
                .map_err(|e| SyncError::local_io(&self.part_path, e))?;
        }
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// 关闭文件但保留 `.part`，留给用户检查或续传
    pub async fn abandon(mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush().await;
        }
    }

    /// 关闭并重命名为最终文件名
    pub async fn commit(mut self) -> Result<u64, SyncError> {
        let Some(mut file) = self.file.take() else {
            return Err(SyncError::local_io(
                &self.part_path,
                io::Error::new(io::ErrorKind::NotFound, "empty response body, nothing written"),
            ));
        };
        file.flush()
            .await
            .map_err(|e| SyncError::local_io(&self.part_path, e))?;
        drop(file);

        tokio::fs::rename(&self.part_path, &self.final_path)
            .await
            .map_err(|e| SyncError::local_io(&self.final_path, e))?;
        Ok(self.written)
    }
}
