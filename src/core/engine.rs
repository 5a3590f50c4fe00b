use crate::core::executor::{DownloadExecutor, DownloadReport};
use crate::core::planner::{plan, read_local_names, SyncPeriod};
use crate::device::{MediaRecord, MediaSource};
use crate::error::SyncError;
use crate::format::format_relative;
use chrono::{DateTime, Utc};
use indicatif::{HumanBytes, HumanCount};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 本地同步目录
    pub dest_dir: PathBuf,
    /// 只同步该时间之后创建的文件
    pub cutoff: DateTime<Utc>,
    /// 是否打印远程文件列表
    pub print_listing: bool,
}

impl SyncConfig {
    pub fn new(dest_dir: impl Into<PathBuf>, period: SyncPeriod) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            cutoff: period.cutoff(Utc::now()),
            print_listing: true,
        }
    }
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub remote_files: usize,
    pub remote_bytes: u64,
    pub planned: usize,
    pub planned_bytes: u64,
    pub download: DownloadReport,
}

impl SyncReport {
    pub fn is_cancelled(&self) -> bool {
        self.download.cancelled
    }
}

/// 同步引擎：列出相机文件，与本地目录比较，下载缺失的文件
pub struct SyncEngine<S: MediaSource> {
    source: S,
    config: SyncConfig,
}

impl<S: MediaSource> SyncEngine<S> {
    pub fn new(source: S, config: SyncConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// 运行一次同步
    ///
    /// 列表或本地目录出错时整个同步失败；单个文件下载失败记录在报告中。
    pub async fn run(&self, cancel: &CancellationToken) -> Result<SyncReport, SyncError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let dest_dir = &self.config.dest_dir;

        info!("开始同步 {} -> {:?} ({})", self.source.name(), dest_dir, run_id);

        let remote = self.source.list_files(cancel).await.inspect_err(|e| {
            if !e.is_cancelled() {
                error!("无法获取文件列表: {}", e);
            }
        })?;

        tokio::fs::create_dir_all(dest_dir).await.map_err(|e| {
            error!("无法创建下载目录 {:?}: {}", dest_dir, e);
            SyncError::local_io(dest_dir, e)
        })?;

        let remote_bytes: u64 = remote.iter().map(|r| r.size).sum();
        if self.config.print_listing {
            print_listing(&remote, started_at);
        }
        info!(
            "相机上共 {} 个文件, 总大小 {}",
            HumanCount(remote.len() as u64),
            HumanBytes(remote_bytes)
        );

        let local_names = read_local_names(dest_dir)?;
        debug!("本地已有 {} 个文件", local_names.len());

        let plan = plan(&remote, &local_names, self.config.cutoff);
        let planned_bytes = plan.total_bytes(&remote);

        let download = if plan.is_empty() {
            info!("no new files to sync");
            DownloadReport::default()
        } else {
            info!("需要下载 {} 个文件 ({})", plan.len(), HumanBytes(planned_bytes));
            DownloadExecutor::new(&self.source)
                .run(cancel, &plan, &remote, dest_dir)
                .await
        };

        if download.cancelled {
            info!(
                "同步已取消: 完成 {} 个, 失败 {} 个",
                download.succeeded(),
                download.failed()
            );
        } else if !plan.is_empty() {
            info!(
                "同步完成: 成功 {} 个, 失败 {} 个, 传输 {}",
                download.succeeded(),
                download.failed(),
                HumanBytes(download.bytes_transferred())
            );
        }

        Ok(SyncReport {
            run_id,
            started_at,
            remote_files: remote.len(),
            remote_bytes,
            planned: plan.len(),
            planned_bytes,
            download,
        })
    }
}

fn print_listing(remote: &[MediaRecord], now: DateTime<Utc>) {
    println!("files on GoPro:\n\tName\t\t\t\tSize\tCreated");
    for file in remote {
        println!(
            "\t{}\t{:>10}\t{}",
            file.name,
            HumanBytes(file.size).to_string(),
            format_relative(file.created_at, now)
        );
    }
    println!(
        "Total size: {}",
        HumanBytes(remote.iter().map(|r| r.size).sum())
    );
}
