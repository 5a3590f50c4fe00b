//! 控制台输出用的相对时间格式化
//!
//! 大小、数量和耗时用 `indicatif` 的 `HumanBytes`/`HumanCount`/`HumanDuration`。

use chrono::{DateTime, Utc};

/// 相对时间，如 `3 days ago`
pub fn format_relative(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if time == DateTime::<Utc>::MIN_UTC {
        return "unknown".to_string();
    }
    let delta = now.signed_duration_since(time);
    let (secs, suffix) = if delta.num_seconds() >= 0 {
        (delta.num_seconds(), "ago")
    } else {
        (-delta.num_seconds(), "from now")
    };

    let (value, unit) = match secs {
        0 => return "now".to_string(),
        s if s < 60 => (s, "second"),
        s if s < 3600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3600, "hour"),
        s if s < 86_400 * 7 => (s / 86_400, "day"),
        s if s < 86_400 * 30 => (s / (86_400 * 7), "week"),
        s if s < 86_400 * 365 => (s / (86_400 * 30), "month"),
        s => (s / (86_400 * 365), "year"),
    };
    let plural = if value == 1 { "" } else { "s" };
    format!("{} {}{} {}", value, unit, plural, suffix)
}
