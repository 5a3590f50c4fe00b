use super::{
    is_plain_file_name, MediaListing, MediaRecord, MediaSource, PartFile, DOWNLOAD_MEDIA_PATH,
    LIST_MEDIA_PATH,
};
use crate::config::DeviceConfig;
use crate::error::SyncError;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::StatusCode;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// GoPro HTTP 媒体接口客户端
///
/// 超时按请求传入，同一个客户端可以在多个调用之间复用连接池。
pub struct DeviceClient {
    host: String,
    http: reqwest::Client,
    request_timeout: Duration,
    download_timeout: Duration,
    chunk_size: usize,
}

impl DeviceClient {
    /// `remote_addr` 非空时连接 `http://<remote_addr>`，否则使用配置里的默认地址
    pub fn new(remote_addr: Option<&str>, config: &DeviceConfig) -> Result<Self, SyncError> {
        let host = match remote_addr.filter(|addr| !addr.is_empty()) {
            Some(addr) => format!("http://{}", addr),
            None => config.default_address.trim_end_matches('/').to_string(),
        };
        // 相机在直连网络上，不走系统代理
        let http = reqwest::Client::builder().no_proxy().build()?;

        Ok(Self {
            host,
            http,
            request_timeout: config.request_timeout(),
            download_timeout: config.download_timeout(),
            chunk_size: config.chunk_size.max(1),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn get(
        &self,
        cancel: &CancellationToken,
        url: &str,
        timeout: Duration,
    ) -> Result<reqwest::Response, SyncError> {
        debug!("GET {} (timeout {:?})", url, timeout);
        let request = self.http.get(url).timeout(timeout).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            response = request => response?,
        };

        if response.status() != StatusCode::OK {
            return Err(SyncError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(response)
    }
}

/// 流读取错误里包着的是 reqwest 错误
fn read_error(err: io::Error, part: &PartFile) -> SyncError {
    let kind = err.kind();
    match err.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(e)) => SyncError::Transport(*e),
        Some(Err(other)) => SyncError::local_io(part.part_path(), io::Error::new(kind, other)),
        None => SyncError::local_io(part.part_path(), io::Error::from(kind)),
    }
}

#[async_trait]
impl MediaSource for DeviceClient {
    async fn list_files(&self, cancel: &CancellationToken) -> Result<Vec<MediaRecord>, SyncError> {
        let url = format!("{}{}", self.host, LIST_MEDIA_PATH);
        let response = self.get(cancel, &url, self.request_timeout).await?;

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            body = response.bytes() => body?,
        };

        let listing = MediaListing::from_slice(&body)?;
        debug!("列表 {} 包含 {} 个分组", listing.id, listing.media.len());
        listing.into_first_group_files()
    }

    async fn download_file(
        &self,
        cancel: &CancellationToken,
        name: &str,
        dest_dir: &Path,
    ) -> Result<u64, SyncError> {
        if !is_plain_file_name(name) {
            return Err(SyncError::MalformedRecord {
                name: name.to_string(),
                field: "n",
                value: name.to_string(),
            });
        }
        let url = format!("{}{}{}", self.host, DOWNLOAD_MEDIA_PATH, urlencoding::encode(name));
        let response = self.get(cancel, &url, self.download_timeout).await?;

        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let reader = StreamReader::new(stream);
        tokio::pin!(reader);
        let mut chunk = vec![0u8; self.chunk_size];
        let mut part = PartFile::new(dest_dir, name);

        let streamed: Result<(), SyncError> = async {
            loop {
                let n = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                    read = reader.read(&mut chunk) => match read {
                        Ok(n) => n,
                        Err(e) => return Err(read_error(e, &part)),
                    },
                };
                if n == 0 {
                    return Ok(());
                }
                part.write_chunk(&chunk[..n]).await?;
            }
        }
        .await;

        match streamed {
            Ok(()) => part.commit().await,
            Err(e) => {
                debug!("{} 中断于 {} 字节: {}", name, part.written(), e);
                part.abandon().await;
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        &self.host
    }
}
