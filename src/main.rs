use anyhow::Context;
use clap::Parser;
use indicatif::{HumanBytes, HumanCount, HumanDuration};
use goprosync_lib::logging::{LogConfig, SizeRotatingWriter};
use goprosync_lib::{
    app_dir, device, DeviceClient, DeviceConfig, SyncConfig, SyncEngine, SyncPeriod,
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

/// Sync media files from a GoPro camera to a local directory
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Local directory to sync into (created if missing)
    sync_dir: PathBuf,

    /// Sync period: year, month, week or day. Default: all files
    period: Option<String>,

    /// Camera address (host:port), skips USB detection
    #[arg(long)]
    address: Option<String>,

    /// Save --address as the default camera address in config.json
    #[arg(long, requires = "address")]
    remember: bool,

    /// Directory holding config.json and the log file
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

/// 初始化日志系统：控制台始终输出，日志文件按配置启用
fn init_logging(config_dir: &Path) {
    let config = LogConfig::load(config_dir);

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(config.tracing_level().into())
        .add_directive("hyper=warn".parse().expect("valid directive"))
        .add_directive("reqwest=warn".parse().expect("valid directive"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = if config.enabled {
        match SizeRotatingWriter::new(config_dir, config.max_size_mb) {
            Ok(writer) => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false),
            ),
            Err(e) => {
                eprintln!("can't open log file in {}: {}", config_dir.display(), e);
                None
            }
        }
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// SIGINT / SIGTERM 触发取消
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    warn!("无法监听 SIGTERM: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        info!("收到中断信号，停止同步");
        cancel.cancel();
    });
}

/// 优先使用命令行地址，其次探测 USB 网卡，最后回落到 Wi-Fi 默认地址
fn resolve_remote_addr(args: &Args, config: &DeviceConfig) -> Option<String> {
    if let Some(addr) = args.address.as_ref().filter(|a| !a.is_empty()) {
        return Some(addr.clone());
    }
    match device::discover_usb_address(&config.usb_prefix) {
        Some(ip) => {
            let addr = format!("{}:{}", ip, config.usb_port);
            println!("try connect to {} by usb connection", addr);
            Some(addr)
        }
        None => {
            println!("try connect by wifi connection");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config_dir = args.config_dir.clone().unwrap_or_else(app_dir);
    let _ = std::fs::create_dir_all(&config_dir);

    init_logging(&config_dir);

    let mut device_config = DeviceConfig::load(&config_dir);
    if let (true, Some(addr)) = (args.remember, args.address.as_deref()) {
        match device_config.remember_address(&config_dir, addr) {
            Ok(()) => info!("默认相机地址已保存: {}", device_config.default_address),
            Err(e) => warn!("无法保存相机地址: {}", e),
        }
    }
    let period = SyncPeriod::parse(args.period.as_deref());
    info!("同步范围: {}", period);

    let remote_addr = resolve_remote_addr(&args, &device_config);
    let client = DeviceClient::new(remote_addr.as_deref(), &device_config)
        .context("can't create http client")?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let engine = SyncEngine::new(client, SyncConfig::new(&args.sync_dir, period));
    match engine.run(&cancel).await {
        Ok(report) => {
            let download = &report.download;
            println!(
                "synced {} of {} files ({}) in {}",
                HumanCount(download.succeeded() as u64),
                HumanCount(report.planned as u64),
                HumanBytes(download.bytes_transferred()),
                HumanDuration(download.elapsed)
            );
            Ok(())
        }
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("can't sync to {}", args.sync_dir.display())),
    }
}
