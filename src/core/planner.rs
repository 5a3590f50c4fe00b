use crate::device::MediaRecord;
use crate::error::SyncError;
use chrono::{DateTime, Duration, Months, Utc};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

/// 同步时间范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPeriod {
    #[default]
    All,
    Year,
    Month,
    Week,
    Day,
}

impl SyncPeriod {
    /// 无法识别的取值按全部同步处理
    pub fn parse(token: Option<&str>) -> Self {
        match token.map(|t| t.to_lowercase()).as_deref() {
            Some("year") => SyncPeriod::Year,
            Some("month") => SyncPeriod::Month,
            Some("week") => SyncPeriod::Week,
            Some("day") => SyncPeriod::Day,
            _ => SyncPeriod::All,
        }
    }

    /// 只同步创建时间严格晚于该时间的文件
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let cutoff = match self {
            SyncPeriod::All => None,
            SyncPeriod::Year => now.checked_sub_months(Months::new(12)),
            SyncPeriod::Month => now.checked_sub_months(Months::new(1)),
            SyncPeriod::Week => now.checked_sub_signed(Duration::days(7)),
            SyncPeriod::Day => now.checked_sub_signed(Duration::days(1)),
        };
        cutoff.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl std::fmt::Display for SyncPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPeriod::All => write!(f, "all"),
            SyncPeriod::Year => write!(f, "year"),
            SyncPeriod::Month => write!(f, "month"),
            SyncPeriod::Week => write!(f, "week"),
            SyncPeriod::Day => write!(f, "day"),
        }
    }
}

/// 下载计划：远程列表中的下标，保持列表原顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPlan {
    pub indices: Vec<usize>,
}

impl DownloadPlan {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn total_bytes(&self, remote: &[MediaRecord]) -> u64 {
        self.indices
            .iter()
            .filter_map(|&i| remote.get(i))
            .map(|r| r.size)
            .sum()
    }
}

/// 计算需要下载的文件
pub fn plan(
    remote: &[MediaRecord],
    local_names: &HashSet<String>,
    cutoff: DateTime<Utc>,
) -> DownloadPlan {
    let indices = remote
        .iter()
        .enumerate()
        .filter(|(_, record)| !local_names.contains(&record.name) && record.created_at > cutoff)
        .map(|(i, _)| i)
        .collect();

    DownloadPlan { indices }
}

/// 读取目标目录下现有的文件名（单层）
pub fn read_local_names(dir: &Path) -> Result<HashSet<String>, SyncError> {
    let mut names = HashSet::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            SyncError::local_io(path, e.into())
        })?;
        if let Some(name) = entry.file_name().to_str() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}
