//! 同步错误类型

use std::path::PathBuf;
use thiserror::Error;

/// 同步过程中可能出现的错误
#[derive(Error, Debug)]
pub enum SyncError {
    /// 网络或连接失败
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 设备返回了非 200 状态码
    #[error("gopro api returned status code {0}")]
    UnexpectedStatus(u16),

    /// 响应体不是合法的列表 JSON
    #[error("can't decode media list: {0}")]
    Decode(#[from] serde_json::Error),

    /// 单条记录的字段无法解析
    #[error("malformed media record {name:?}: field {field} = {value:?}")]
    MalformedRecord {
        name: String,
        field: &'static str,
        value: String,
    },

    /// 列表里没有任何媒体分组
    #[error("empty media")]
    EmptyMedia,

    /// 本地目录或临时文件读写失败
    #[error("{}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 用户取消
    #[error("cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    pub(crate) fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::LocalIo {
            path: path.into(),
            source,
        }
    }
}
