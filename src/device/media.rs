//! 媒体列表解析
//!
//! 相机返回的列表里数字和时间都编码成字符串，先反序列化为全字符串的
//! 原始结构，再逐字段转换成带类型的记录。

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::Path;

/// 相机上的单个媒体文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub size: u64,
    /// 低分辨率视频大小，-1 表示不适用
    pub low_res_video_size: i64,
    /// 低分辨率文件大小，-1 表示没有 LRV 文件
    pub low_res_file_size: i64,
}

/// 一个目录下的媒体文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaGroup {
    pub directory: String,
    pub files: Vec<MediaRecord>,
}

/// 列表响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaListing {
    pub id: String,
    pub media: Vec<MediaGroup>,
}

/// 线上格式的记录，所有字段都是字符串
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMediaRecord {
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub s: String,
    #[serde(default)]
    pub cre: String,
    #[serde(default)]
    pub r#mod: String,
    #[serde(default)]
    pub glrv: String,
    #[serde(default)]
    pub ls: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMediaGroup {
    #[serde(default)]
    pub d: String,
    #[serde(default)]
    pub fs: Vec<RawMediaRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMediaListing {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub media: Vec<RawMediaGroup>,
}

/// 零值时间，解析失败的时间字段保留此值
pub const ZERO_TIME: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

fn parse_epoch(value: &str) -> Option<DateTime<Utc>> {
    let secs = value.parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0)
}

/// 文件名只能是单独一段普通路径，`dest_dir.join(name)` 才会落在下载目录里
pub fn is_plain_file_name(name: &str) -> bool {
    Path::new(name).file_name() == Some(OsStr::new(name))
}

/// 空字符串视为字段缺失
fn parse_optional_size(
    name: &str,
    field: &'static str,
    value: &str,
) -> Result<i64, SyncError> {
    if value.is_empty() {
        return Ok(0);
    }
    value.parse::<i64>().map_err(|_| SyncError::MalformedRecord {
        name: name.to_string(),
        field,
        value: value.to_string(),
    })
}

impl TryFrom<RawMediaRecord> for MediaRecord {
    type Error = SyncError;

    fn try_from(raw: RawMediaRecord) -> Result<Self, Self::Error> {
        let size = raw.s.parse::<u64>().map_err(|_| SyncError::MalformedRecord {
            name: raw.n.clone(),
            field: "s",
            value: raw.s.clone(),
        })?;
        if !is_plain_file_name(&raw.n) {
            return Err(SyncError::MalformedRecord {
                name: raw.n.clone(),
                field: "n",
                value: raw.n.clone(),
            });
        }
        let low_res_file_size = parse_optional_size(&raw.n, "ls", &raw.ls)?;
        let low_res_video_size = parse_optional_size(&raw.n, "glrv", &raw.glrv)?;

        Ok(MediaRecord {
            created_at: parse_epoch(&raw.cre).unwrap_or(ZERO_TIME),
            modified_at: parse_epoch(&raw.r#mod).unwrap_or(ZERO_TIME),
            size,
            low_res_video_size,
            low_res_file_size,
            name: raw.n,
        })
    }
}

impl From<&MediaRecord> for RawMediaRecord {
    fn from(record: &MediaRecord) -> Self {
        let epoch = |t: &DateTime<Utc>| {
            if *t == ZERO_TIME {
                String::new()
            } else {
                t.timestamp().to_string()
            }
        };
        RawMediaRecord {
            n: record.name.clone(),
            s: record.size.to_string(),
            cre: epoch(&record.created_at),
            r#mod: epoch(&record.modified_at),
            glrv: record.low_res_video_size.to_string(),
            ls: record.low_res_file_size.to_string(),
        }
    }
}

impl TryFrom<RawMediaListing> for MediaListing {
    type Error = SyncError;

    fn try_from(raw: RawMediaListing) -> Result<Self, Self::Error> {
        let media = raw
            .media
            .into_iter()
            .map(|group| {
                let files = group
                    .fs
                    .into_iter()
                    .map(MediaRecord::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(MediaGroup {
                    directory: group.d,
                    files,
                })
            })
            .collect::<Result<Vec<_>, SyncError>>()?;

        Ok(MediaListing { id: raw.id, media })
    }
}

impl From<&MediaListing> for RawMediaListing {
    fn from(listing: &MediaListing) -> Self {
        RawMediaListing {
            id: listing.id.clone(),
            media: listing
                .media
                .iter()
                .map(|group| RawMediaGroup {
                    d: group.directory.clone(),
                    fs: group.files.iter().map(RawMediaRecord::from).collect(),
                })
                .collect(),
        }
    }
}

impl MediaListing {
    /// 解析列表响应体
    pub fn from_slice(body: &[u8]) -> Result<Self, SyncError> {
        let raw: RawMediaListing = serde_json::from_slice(body)?;
        raw.try_into()
    }

    pub fn to_json(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(&RawMediaListing::from(self))?)
    }

    /// 只使用第一个分组
    pub fn into_first_group_files(self) -> Result<Vec<MediaRecord>, SyncError> {
        self.media
            .into_iter()
            .next()
            .map(|group| group.files)
            .ok_or(SyncError::EmptyMedia)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "id": "2913357424427262",
        "media": [{
            "d": "100GOPRO",
            "fs": [
                {"n": "GX010001.MP4", "cre": "1700000000", "mod": "1700000100", "glrv": "3117438", "ls": "-1", "s": "123456789"},
                {"n": "GOPR0002.JPG", "cre": "1700000200", "mod": "1700000200", "s": "4567"}
            ]
        }]
    }"#;

    fn record(name: &str, size: u64, cre: i64) -> MediaRecord {
        MediaRecord {
            name: name.to_string(),
            created_at: DateTime::from_timestamp(cre, 0).unwrap(),
            modified_at: DateTime::from_timestamp(cre + 60, 0).unwrap(),
            size,
            low_res_video_size: -1,
            low_res_file_size: 2048,
        }
    }

    #[test]
    fn test_decode_sample() {
        let listing = MediaListing::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(listing.id, "2913357424427262");
        assert_eq!(listing.media.len(), 1);
        assert_eq!(listing.media[0].directory, "100GOPRO");

        let files = listing.into_first_group_files().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "GX010001.MP4");
        assert_eq!(files[0].size, 123_456_789);
        assert_eq!(files[0].created_at.timestamp(), 1_700_000_000);
        assert_eq!(files[0].modified_at.timestamp(), 1_700_000_100);
        assert_eq!(files[0].low_res_video_size, 3_117_438);
        assert_eq!(files[0].low_res_file_size, -1);
        // 缺失的可选字段保持 0
        assert_eq!(files[1].low_res_video_size, 0);
        assert_eq!(files[1].low_res_file_size, 0);
    }

    #[test]
    fn test_round_trip() {
        let records = vec![
            record("GX010001.MP4", 0, 0),
            record("GX010002.MP4", u64::MAX, 1_700_000_000),
            MediaRecord {
                low_res_video_size: 42,
                low_res_file_size: -1,
                ..record("GOPR0003.JPG", 1024, 1_600_000_000)
            },
        ];
        for original in records {
            let raw = RawMediaRecord::from(&original);
            let json = serde_json::to_string(&raw).unwrap();
            let back: RawMediaRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(MediaRecord::try_from(back).unwrap(), original);
        }
    }

    #[test]
    fn test_listing_to_json_round_trip() {
        let listing = MediaListing::from_slice(SAMPLE.as_bytes()).unwrap();
        let json = listing.to_json().unwrap();
        assert_eq!(MediaListing::from_slice(json.as_bytes()).unwrap(), listing);
    }

    #[test]
    fn test_malformed_size_is_fatal() {
        let body = r#"{"id":"1","media":[{"d":"100GOPRO","fs":[{"n":"a.MP4","s":"abc","cre":"1"}]}]}"#;
        match MediaListing::from_slice(body.as_bytes()) {
            Err(SyncError::MalformedRecord { name, field, value }) => {
                assert_eq!(name, "a.MP4");
                assert_eq!(field, "s");
                assert_eq!(value, "abc");
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_size_is_fatal() {
        let raw = RawMediaRecord {
            n: "a.MP4".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            MediaRecord::try_from(raw),
            Err(SyncError::MalformedRecord { field: "s", .. })
        ));
    }

    #[test]
    fn test_name_must_stay_in_directory() {
        for name in ["/tmp/evil.MP4", "../evil.MP4", "100GOPRO/GX010001.MP4", "a.MP4/", "..", ".", ""] {
            let raw = RawMediaRecord {
                n: name.to_string(),
                s: "5".to_string(),
                ..Default::default()
            };
            assert!(
                matches!(
                    MediaRecord::try_from(raw),
                    Err(SyncError::MalformedRecord { field: "n", .. })
                ),
                "{:?} should be rejected",
                name
            );
        }

        let body = r#"{"id":"1","media":[{"d":"100GOPRO","fs":[{"n":"../../.bashrc","s":"5"}]}]}"#;
        assert!(matches!(
            MediaListing::from_slice(body.as_bytes()),
            Err(SyncError::MalformedRecord { field: "n", .. })
        ));
        assert!(is_plain_file_name("GX010001.MP4"));
        assert!(is_plain_file_name(".hidden"));
    }

    #[test]
    fn test_empty_optional_field_tolerated() {
        let raw = RawMediaRecord {
            n: "a.MP4".to_string(),
            s: "10".to_string(),
            ls: String::new(),
            glrv: String::new(),
            ..Default::default()
        };
        let record = MediaRecord::try_from(raw).unwrap();
        assert_eq!(record.low_res_file_size, 0);
        assert_eq!(record.low_res_video_size, 0);
    }

    #[test]
    fn test_unparsable_optional_field_is_fatal() {
        let raw = RawMediaRecord {
            n: "a.MP4".to_string(),
            s: "10".to_string(),
            glrv: "x1".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            MediaRecord::try_from(raw),
            Err(SyncError::MalformedRecord { field: "glrv", .. })
        ));
    }

    #[test]
    fn test_bad_timestamp_left_at_zero() {
        let raw = RawMediaRecord {
            n: "a.MP4".to_string(),
            s: "10".to_string(),
            cre: "yesterday".to_string(),
            r#mod: "1700000000".to_string(),
            ..Default::default()
        };
        let record = MediaRecord::try_from(raw).unwrap();
        assert_eq!(record.created_at, ZERO_TIME);
        assert_eq!(record.modified_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_empty_media() {
        let listing = MediaListing::from_slice(br#"{"id":"1","media":[]}"#).unwrap();
        assert!(matches!(
            listing.into_first_group_files(),
            Err(SyncError::EmptyMedia)
        ));
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        assert!(matches!(
            MediaListing::from_slice(b"<html>"),
            Err(SyncError::Decode(_))
        ));
        // 数字字段不是字符串也是格式错误
        assert!(matches!(
            MediaListing::from_slice(br#"{"id":"1","media":[{"d":"x","fs":[{"n":"a","s":10}]}]}"#),
            Err(SyncError::Decode(_))
        ));
    }
}
