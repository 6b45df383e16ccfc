//! Database models

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Verification status of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Verified,
    FalseAlarm,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Verified => "verified",
            ReportStatus::FalseAlarm => "false_alarm",
        }
    }

    /// Verified and false_alarm are terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::Pending)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "verified" => Ok(ReportStatus::Verified),
            "false_alarm" => Ok(ReportStatus::FalseAlarm),
            other => Err(Error::Validation(format!("Unknown report status '{}'", other))),
        }
    }
}

/// Kind of media attached to a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Extension used for scratch copies
    pub fn scratch_extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single media reference a report carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRef {
    Image(i64),
    Video(i64),
}

impl MediaRef {
    /// Build from the two nullable storage columns; exactly one must be set
    pub fn from_columns(image_id: Option<i64>, video_id: Option<i64>) -> Result<Self> {
        match (image_id, video_id) {
            (Some(id), None) => Ok(MediaRef::Image(id)),
            (None, Some(id)) => Ok(MediaRef::Video(id)),
            (Some(_), Some(_)) => Err(Error::Validation(
                "report references both an image and a video".to_string(),
            )),
            (None, None) => Err(Error::Validation("report has no media reference".to_string())),
        }
    }

    pub fn media_id(&self) -> i64 {
        match self {
            MediaRef::Image(id) | MediaRef::Video(id) => *id,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaRef::Image(_) => MediaKind::Image,
            MediaRef::Video(_) => MediaKind::Video,
        }
    }

    /// (image_id, video_id) column values
    pub fn to_columns(&self) -> (Option<i64>, Option<i64>) {
        match self {
            MediaRef::Image(id) => (Some(*id), None),
            MediaRef::Video(id) => (None, Some(*id)),
        }
    }
}

/// Where the incident was reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

/// An incident report awaiting or past verification
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub report_id: i64,
    pub user_id: i64,
    pub media: MediaRef,
    pub location: Location,
    pub submitted_at: String,
    pub verified: bool,
    pub status: ReportStatus,
}

/// Raw `reports` row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRow {
    pub report_id: i64,
    pub user_id: i64,
    pub image_id: Option<i64>,
    pub video_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub submitted_at: String,
    pub verified: bool,
    pub status: String,
}

impl TryFrom<ReportRow> for Report {
    type Error = Error;

    fn try_from(row: ReportRow) -> Result<Self> {
        let media = MediaRef::from_columns(row.image_id, row.video_id).map_err(|e| {
            Error::Validation(format!("report {}: {}", row.report_id, e))
        })?;

        Ok(Report {
            report_id: row.report_id,
            user_id: row.user_id,
            media,
            location: Location {
                latitude: row.latitude,
                longitude: row.longitude,
                address: row.address,
            },
            submitted_at: row.submitted_at,
            verified: row.verified,
            status: row.status.parse()?,
        })
    }
}

/// Fire size class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireType {
    Small,
    Medium,
    Large,
    None,
}

/// Fire severity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    Mild,
    Moderate,
    Severe,
    None,
}

/// Fire spread potential class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadPotential {
    Low,
    Medium,
    High,
    None,
}

macro_rules! class_labels {
    ($ty:ident { $($idx:literal => $variant:ident : $label:literal),+ $(,)? }) => {
        impl $ty {
            /// Map a classifier output index to its label
            pub fn from_index(index: usize) -> Option<Self> {
                match index {
                    $($idx => Some($ty::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $label,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($label => Ok($ty::$variant),)+
                    other => Err(Error::Validation(format!(
                        "Unknown {} '{}'", stringify!($ty), other
                    ))),
                }
            }
        }
    };
}

class_labels!(FireType { 0 => Small: "small", 1 => Medium: "medium", 2 => Large: "large", 3 => None: "none" });
class_labels!(SeverityLevel { 0 => Mild: "mild", 1 => Moderate: "moderate", 2 => Severe: "severe", 3 => None: "none" });
class_labels!(SpreadPotential { 0 => Low: "low", 1 => Medium: "medium", 2 => High: "high", 3 => None: "none" });

/// Classification details, only present for detected fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireClassification {
    pub fire_type: FireType,
    pub severity_level: SeverityLevel,
    pub spread_potential: SpreadPotential,
}

/// A verdict about to be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewVerdict {
    pub report_id: i64,
    pub detected: bool,
    /// Percentage with two decimals
    pub confidence_score: f64,
    pub verified_at: DateTime<Utc>,
    #[serde(flatten)]
    pub classification: Option<FireClassification>,
}

/// A persisted verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub verification_id: i64,
    pub report_id: i64,
    pub detected: bool,
    pub confidence_score: f64,
    pub verified_at: String,
    #[serde(flatten)]
    pub classification: Option<FireClassification>,
}

/// Raw `verdicts` row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VerdictRow {
    pub verification_id: i64,
    pub report_id: i64,
    pub detected: bool,
    pub confidence_score: f64,
    pub verified_at: String,
    pub fire_type: Option<String>,
    pub severity_level: Option<String>,
    pub spread_potential: Option<String>,
}

impl TryFrom<VerdictRow> for Verdict {
    type Error = Error;

    fn try_from(row: VerdictRow) -> Result<Self> {
        let classification = match (row.fire_type, row.severity_level, row.spread_potential) {
            (Some(t), Some(s), Some(p)) => Some(FireClassification {
                fire_type: t.parse()?,
                severity_level: s.parse()?,
                spread_potential: p.parse()?,
            }),
            (None, None, None) => None,
            _ => {
                return Err(Error::Validation(format!(
                    "verdict {} has a partial classification",
                    row.verification_id
                )))
            }
        };

        Ok(Verdict {
            verification_id: row.verification_id,
            report_id: row.report_id,
            detected: row.detected,
            confidence_score: row.confidence_score,
            verified_at: row.verified_at,
            classification,
        })
    }
}

/// Stored media payload
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MediaBlob {
    pub media_id: i64,
    pub owner_id: i64,
    pub file_data: Vec<u8>,
    pub file_type: String,
    pub file_name: String,
}
