use crate::core::planner::DownloadPlan;
use crate::device::{MediaRecord, MediaSource};
use indicatif::{HumanBytes, HumanCount, HumanDuration};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 单个文件的下载结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum FileResult {
    Downloaded { bytes: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub name: String,
    pub size: u64,
    pub elapsed: Duration,
    pub result: FileResult,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, FileResult::Downloaded { .. })
    }
}

/// 一次下载批次的报告，被取消时未尝试的文件不在其中
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    pub outcomes: Vec<FileOutcome>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl DownloadReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o.result {
                FileResult::Downloaded { bytes } => bytes,
                FileResult::Failed { .. } => 0,
            })
            .sum()
    }
}

/// 顺序下载执行器
pub struct DownloadExecutor<'a, S: MediaSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: MediaSource + ?Sized> DownloadExecutor<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// 按计划顺序逐个下载；单个文件失败不影响后续文件，取消则立即停止
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        plan: &DownloadPlan,
        remote: &[MediaRecord],
        dest_dir: &Path,
    ) -> DownloadReport {
        let batch_start = Instant::now();
        let mut report = DownloadReport::default();

        for &index in &plan.indices {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let Some(record) = remote.get(index) else {
                warn!("计划下标 {} 超出远程列表范围，跳过", index);
                continue;
            };

            info!(
                "开始下载 {} (size={} bytes, created at {})...",
                record.name,
                HumanCount(record.size),
                record.created_at
            );
            let start = Instant::now();
            let result = self.source.download_file(cancel, &record.name, dest_dir).await;
            let elapsed = start.elapsed();

            let result = match result {
                Ok(bytes) => {
                    info!(
                        "下载 {} 完成，用时 {} ({})",
                        record.name,
                        HumanDuration(elapsed),
                        HumanBytes(bytes)
                    );
                    FileResult::Downloaded { bytes }
                }
                // 取消后失败的下载同样按取消处理，不计入失败
                Err(e) if e.is_cancelled() || cancel.is_cancelled() => {
                    info!("下载 {} 已取消: {}", record.name, e);
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        "下载失败 {} (用时 {}): {}",
                        record.name,
                        HumanDuration(elapsed),
                        e
                    );
                    FileResult::Failed {
                        error: e.to_string(),
                    }
                }
            };

            report.outcomes.push(FileOutcome {
                name: record.name.clone(),
                size: record.size,
                elapsed,
                result,
            });
        }

        report.elapsed = batch_start.elapsed();
        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::planner::plan;
    use crate::device::PartFile;
    use crate::error::SyncError;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// 模拟相机上某个文件的下载行为
    #[derive(Clone)]
    pub(crate) enum Behavior {
        Content(Vec<u8>),
        Status(u16),
        /// 写入一部分后断开
        Interrupt(Vec<u8>),
        /// 写入一部分后触发取消
        CancelMidway(Vec<u8>),
        /// 触发取消的同时连接出错
        ResetOnCancel(Vec<u8>),
    }

    pub(crate) struct FakeCamera {
        pub files: Vec<MediaRecord>,
        pub behaviors: HashMap<String, Behavior>,
        pub attempts: Mutex<Vec<String>>,
        pub cancel: CancellationToken,
    }

    impl FakeCamera {
        pub fn new(cancel: &CancellationToken) -> Self {
            Self {
                files: Vec::new(),
                behaviors: HashMap::new(),
                attempts: Mutex::new(Vec::new()),
                cancel: cancel.clone(),
            }
        }

        pub fn with_file(mut self, name: &str, created: i64, behavior: Behavior) -> Self {
            let size = match &behavior {
                Behavior::Content(data) => data.len() as u64,
                _ => 1024,
            };
            self.files.push(MediaRecord {
                name: name.to_string(),
                created_at: DateTime::from_timestamp(created, 0).unwrap(),
                modified_at: DateTime::from_timestamp(created, 0).unwrap(),
                size,
                low_res_video_size: -1,
                low_res_file_size: -1,
            });
            self.behaviors.insert(name.to_string(), behavior);
            self
        }

        pub fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaSource for FakeCamera {
        async fn list_files(
            &self,
            _cancel: &CancellationToken,
        ) -> Result<Vec<MediaRecord>, SyncError> {
            Ok(self.files.clone())
        }

        async fn download_file(
            &self,
            cancel: &CancellationToken,
            name: &str,
            dest_dir: &Path,
        ) -> Result<u64, SyncError> {
            self.attempts.lock().unwrap().push(name.to_string());
            let mut part = PartFile::new(dest_dir, name);
            match self.behaviors.get(name).cloned() {
                Some(Behavior::Content(data)) => {
                    for chunk in data.chunks(4096) {
                        if cancel.is_cancelled() {
                            part.abandon().await;
                            return Err(SyncError::Cancelled);
                        }
                        part.write_chunk(chunk).await?;
                    }
                    part.commit().await
                }
                Some(Behavior::Status(code)) => Err(SyncError::UnexpectedStatus(code)),
                Some(Behavior::Interrupt(data)) => {
                    part.write_chunk(&data).await?;
                    part.abandon().await;
                    Err(SyncError::local_io(
                        dest_dir.join(name),
                        std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
                    ))
                }
                Some(Behavior::CancelMidway(data)) => {
                    part.write_chunk(&data).await?;
                    self.cancel.cancel();
                    part.abandon().await;
                    Err(SyncError::Cancelled)
                }
                Some(Behavior::ResetOnCancel(data)) => {
                    part.write_chunk(&data).await?;
                    self.cancel.cancel();
                    let part_path = part.part_path().to_path_buf();
                    part.abandon().await;
                    Err(SyncError::local_io(
                        part_path,
                        std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
                    ))
                }
                None => Err(SyncError::UnexpectedStatus(404)),
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn full_plan(camera: &FakeCamera) -> DownloadPlan {
        plan(&camera.files, &HashSet::new(), DateTime::<chrono::Utc>::MIN_UTC)
    }

    #[tokio::test]
    async fn test_downloads_in_order() {
        let cancel = CancellationToken::new();
        let camera = FakeCamera::new(&cancel)
            .with_file("b.MP4", 20, Behavior::Content(vec![2; 5000]))
            .with_file("a.MP4", 10, Behavior::Content(vec![1; 10]));
        let dir = tempfile::tempdir().unwrap();

        let report = DownloadExecutor::new(&camera)
            .run(&cancel, &full_plan(&camera), &camera.files, dir.path())
            .await;

        assert_eq!(camera.attempts(), vec!["b.MP4", "a.MP4"]);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.bytes_transferred(), 5010);
        assert!(!report.cancelled);
        assert_eq!(std::fs::read(dir.path().join("b.MP4")).unwrap().len(), 5000);
    }

    #[tokio::test]
    async fn test_partial_failure_continues() {
        let cancel = CancellationToken::new();
        let camera = FakeCamera::new(&cancel)
            .with_file("1.MP4", 10, Behavior::Content(vec![1; 100]))
            .with_file("2.MP4", 20, Behavior::Status(500))
            .with_file("3.MP4", 30, Behavior::Content(vec![3; 100]));
        let dir = tempfile::tempdir().unwrap();

        let report = DownloadExecutor::new(&camera)
            .run(&cancel, &full_plan(&camera), &camera.files, dir.path())
            .await;

        assert_eq!(camera.attempts(), vec!["1.MP4", "2.MP4", "3.MP4"]);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.outcomes[1].result,
            FileResult::Failed {
                error: "gopro api returned status code 500".to_string()
            }
        );
        assert!(dir.path().join("1.MP4").exists());
        assert!(!dir.path().join("2.MP4").exists());
        assert!(dir.path().join("3.MP4").exists());
    }

    #[tokio::test]
    async fn test_interrupted_download_is_not_finalized() {
        let cancel = CancellationToken::new();
        let camera = FakeCamera::new(&cancel)
            .with_file("a.MP4", 10, Behavior::Interrupt(vec![9; 3000]))
            .with_file("b.MP4", 20, Behavior::Content(vec![1; 10]));
        let dir = tempfile::tempdir().unwrap();

        let report = DownloadExecutor::new(&camera)
            .run(&cancel, &full_plan(&camera), &camera.files, dir.path())
            .await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert!(!dir.path().join("a.MP4").exists());
        assert_eq!(std::fs::read(dir.path().join("a.MP4.part")).unwrap(), vec![9; 3000]);
    }

    #[tokio::test]
    async fn test_cancel_stops_batch() {
        let cancel = CancellationToken::new();
        let camera = FakeCamera::new(&cancel)
            .with_file("1.MP4", 10, Behavior::Content(vec![1; 100]))
            .with_file("2.MP4", 20, Behavior::CancelMidway(vec![2; 50]))
            .with_file("3.MP4", 30, Behavior::Content(vec![3; 100]));
        let dir = tempfile::tempdir().unwrap();

        let report = DownloadExecutor::new(&camera)
            .run(&cancel, &full_plan(&camera), &camera.files, dir.path())
            .await;

        assert!(report.cancelled);
        assert_eq!(camera.attempts(), vec!["1.MP4", "2.MP4"]);
        // 被取消的文件不算失败
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.failed(), 0);
        assert!(dir.path().join("1.MP4").exists());
        assert!(!dir.path().join("2.MP4").exists());
        assert!(dir.path().join("2.MP4.part").exists());
        assert!(!dir.path().join("3.MP4").exists());
    }

    #[tokio::test]
    async fn test_error_during_cancel_is_not_a_failure() {
        let cancel = CancellationToken::new();
        let camera = FakeCamera::new(&cancel)
            .with_file("1.MP4", 10, Behavior::Content(vec![1; 100]))
            .with_file("2.MP4", 20, Behavior::ResetOnCancel(vec![2; 50]))
            .with_file("3.MP4", 30, Behavior::Content(vec![3; 100]));
        let dir = tempfile::tempdir().unwrap();

        let report = DownloadExecutor::new(&camera)
            .run(&cancel, &full_plan(&camera), &camera.files, dir.path())
            .await;

        assert!(report.cancelled);
        assert_eq!(camera.attempts(), vec!["1.MP4", "2.MP4"]);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.failed(), 0);
        assert!(dir.path().join("2.MP4.part").exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let camera = FakeCamera::new(&cancel).with_file("1.MP4", 10, Behavior::Content(vec![1]));
        let dir = tempfile::tempdir().unwrap();

        let report = DownloadExecutor::new(&camera)
            .run(&cancel, &full_plan(&camera), &camera.files, dir.path())
            .await;

        assert!(report.cancelled);
        assert!(report.outcomes.is_empty());
        assert!(camera.attempts().is_empty());
    }
}
