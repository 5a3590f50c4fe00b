use std::path::PathBuf;

pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod format;
pub mod logging;

pub use config::DeviceConfig;
pub use crate::core::{SyncConfig, SyncEngine, SyncPeriod, SyncReport};
pub use device::{DeviceClient, MediaRecord, MediaSource};
pub use error::SyncError;

/// 应用数据目录：配置文件和日志都放在这里
pub fn app_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("goprosync"))
        .unwrap_or_else(|| PathBuf::from(".goprosync"))
}

// 按各平台约定推断配置目录
pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }
}
