//! 应用配置模块

use crate::device::{
    CHUNK_SIZE, DEFAULT_REMOTE_ADDR, DOWNLOAD_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

/// 相机连接配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// 找不到 USB 网卡时使用的地址
    #[serde(default = "default_address")]
    pub default_address: String,
    /// USB 网卡地址前缀
    #[serde(default = "default_usb_prefix")]
    pub usb_prefix: String,
    #[serde(default = "default_usb_port")]
    pub usb_port: u16,
    /// 列表请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// 下载超时（秒）
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_address() -> String {
    DEFAULT_REMOTE_ADDR.to_string()
}

fn default_usb_prefix() -> String {
    "172.2".to_string()
}

fn default_usb_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    REQUEST_TIMEOUT_SECS
}

fn default_download_timeout() -> u64 {
    DOWNLOAD_TIMEOUT_SECS
}

fn default_chunk_size() -> usize {
    CHUNK_SIZE
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            default_address: default_address(),
            usb_prefix: default_usb_prefix(),
            usb_port: default_usb_port(),
            request_timeout_secs: default_request_timeout(),
            download_timeout_secs: default_download_timeout(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl DeviceConfig {
    /// 从配置文件加载相机配置
    pub fn load(config_dir: &Path) -> Self {
        let config_file = config_dir.join("config.json");
        fs::read_to_string(&config_file)
            .ok()
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            .and_then(|config| config.get("device").cloned())
            .and_then(|device| serde_json::from_value::<DeviceConfig>(device).ok())
            .unwrap_or_default()
    }

    /// 保存相机配置，保留文件中的其他配置段
    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        let config_file = config_dir.join("config.json");

        let mut config: serde_json::Value = if config_file.exists() {
            let content = fs::read_to_string(&config_file)?;
            serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        config["device"] = serde_json::to_value(self)?;

        fs::create_dir_all(config_dir)?;
        fs::write(&config_file, serde_json::to_string_pretty(&config)?)
    }

    /// 把 `host:port` 记为默认相机地址并写回配置文件
    pub fn remember_address(&mut self, config_dir: &Path, addr: &str) -> io::Result<()> {
        self.default_address = format!("http://{}", addr.trim_end_matches('/'));
        self.save(config_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
