//! USB 连接地址探测
//!
//! 相机通过 USB 连接时会在主机上出现一块 `172.2x.xxx.yyy` 的网卡，
//! 相机自己在同一网段的 `.51` 上。

use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;

/// 相机在 USB 网段上的主机号
const CAMERA_HOST_OCTET: u8 = 51;

/// 根据本机网卡地址推出相机地址
pub fn camera_address_for(local: Ipv4Addr, prefix: &str) -> Option<Ipv4Addr> {
    if local.is_loopback() || !local.to_string().starts_with(prefix) {
        return None;
    }
    let [a, b, c, _] = local.octets();
    Some(Ipv4Addr::new(a, b, c, CAMERA_HOST_OCTET))
}

/// 找到第一个匹配前缀的网卡，返回相机地址
pub fn discover_usb_address(prefix: &str) -> Option<String> {
    local_ipv4_addrs()
        .into_iter()
        .find_map(|addr| camera_address_for(addr, prefix))
        .map(|addr| addr.to_string())
}

fn local_ipv4_addrs() -> Vec<Ipv4Addr> {
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces
            .into_iter()
            .filter_map(|iface| match iface.ip() {
                IpAddr::V4(addr) => Some(addr),
                IpAddr::V6(_) => None,
            })
            .collect(),
        Err(e) => {
            debug!("无法枚举网卡: {}", e);
            Vec::new()
        }
    }
}
