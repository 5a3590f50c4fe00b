pub mod client;
pub mod media;
pub mod net;
pub mod part;

use crate::error::SyncError;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub use client::DeviceClient;
pub use media::{
    is_plain_file_name, MediaGroup, MediaListing, MediaRecord, RawMediaListing, RawMediaRecord,
};
pub use net::discover_usb_address;
pub use part::PartFile;

// ============ 公共常量 ============

/// 元数据请求超时（秒）
pub const REQUEST_TIMEOUT_SECS: u64 = 5;
/// 下载超时（秒）
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;
/// 流式下载的分块大小
pub const CHUNK_SIZE: usize = 4096;
/// Wi-Fi 连接时的相机地址
pub const DEFAULT_REMOTE_ADDR: &str = "http://10.5.5.9:8080";

pub const LIST_MEDIA_PATH: &str = "/gopro/media/list";
pub const DOWNLOAD_MEDIA_PATH: &str = "/videos/DCIM/100GOPRO/";

/// 下载中文件的后缀
pub const PART_SUFFIX: &str = ".part";

/// 媒体源抽象接口
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// 列出第一个媒体分组的全部文件
    async fn list_files(&self, cancel: &CancellationToken) -> Result<Vec<MediaRecord>, SyncError>;

    /// 下载文件到 `dest_dir/name`，先写 `.part` 再重命名，返回写入的字节数
    async fn download_file(
        &self,
        cancel: &CancellationToken,
        name: &str,
        dest_dir: &Path,
    ) -> Result<u64, SyncError>;

    /// 获取媒体源名称（用于日志）
    fn name(&self) -> &str;
}
