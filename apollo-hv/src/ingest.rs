//! Report submission
//!
//! Clients post a loosely shaped JSON document. It is normalized into one
//! validated [`ReportSubmission`] before anything touches the store:
//!
//! ```json
//! {
//!   "reporter": { "id": 12 },
//!   "location": {
//!     "coordinates": { "latitude": 14.65, "longitude": 121.07 },
//!     "address": "Katipunan Ave, Quezon City"
//!   },
//!   "media": {
//!     "kind": "image",
//!     "content_type": "image/jpeg",
//!     "file_name": "fire.jpg",
//!     "data": "<base64>"
//!   },
//!   "submitted_at": "2025-06-01T08:00:00Z"
//! }
//! ```
//!
//! `content_type`, `file_name` and `submitted_at` are optional.

use crate::db::{media, reports};
use crate::error::{PipelineError, PipelineResult};
use apollo_common::db::{Location, MediaKind, MediaRef};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;

#[derive(Debug, Deserialize)]
struct SubmissionPayload {
    reporter: Option<ReporterPayload>,
    location: Option<LocationPayload>,
    media: Option<MediaPayload>,
    submitted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReporterPayload {
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LocationPayload {
    coordinates: Option<CoordinatesPayload>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoordinatesPayload {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MediaPayload {
    kind: Option<String>,
    content_type: Option<String>,
    file_name: Option<String>,
    data: Option<String>,
}

/// Media attached to a submission, decoded
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedMedia {
    pub kind: MediaKind,
    pub content_type: String,
    pub file_name: String,
    pub data: Vec<u8>,
}

/// A validated report submission
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSubmission {
    pub user_id: i64,
    pub location: Location,
    pub media: SubmittedMedia,
    pub submitted_at: DateTime<Utc>,
}

/// Ids assigned to a stored submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoredSubmission {
    pub report_id: i64,
    pub media_id: i64,
}

fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::Validation(msg.into())
}

impl ReportSubmission {
    /// Validate a raw JSON body
    pub fn from_json(body: Value) -> PipelineResult<Self> {
        let payload: SubmissionPayload = serde_json::from_value(body)
            .map_err(|e| invalid(format!("malformed submission: {}", e)))?;

        let user_id = payload
            .reporter
            .and_then(|r| r.id)
            .ok_or_else(|| invalid("reporter.id is required"))?;
        if user_id <= 0 {
            return Err(invalid("reporter.id must be positive"));
        }

        let location = payload.location.ok_or_else(|| invalid("location is required"))?;
        let coordinates = location
            .coordinates
            .ok_or_else(|| invalid("location.coordinates is required"))?;
        let latitude = coordinates
            .latitude
            .ok_or_else(|| invalid("location.coordinates.latitude is required"))?;
        let longitude = coordinates
            .longitude
            .ok_or_else(|| invalid("location.coordinates.longitude is required"))?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(invalid(format!("latitude {} out of range", latitude)));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(invalid(format!("longitude {} out of range", longitude)));
        }
        let address = location
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| invalid("location.address is required"))?;

        let media = SubmittedMedia::from_payload(
            payload.media.ok_or_else(|| invalid("media is required"))?,
        )?;

        let submitted_at = match payload.submitted_at {
            Some(ts) => DateTime::parse_from_rfc3339(&ts)
                .map_err(|e| invalid(format!("submitted_at '{}' is not RFC 3339: {}", ts, e)))?
                .with_timezone(&Utc),
            None => Utc::now(),
        };

        Ok(Self {
            user_id,
            location: Location {
                latitude,
                longitude,
                address,
            },
            media,
            submitted_at,
        })
    }

    /// Store the media blob and the pending report in one transaction
    pub async fn store(&self, pool: &SqlitePool) -> PipelineResult<StoredSubmission> {
        let mut tx = pool.begin().await?;

        let media_id = media::insert_media(
            &mut *tx,
            self.user_id,
            &self.media.content_type,
            &self.media.file_name,
            &self.media.data,
        )
        .await?;

        let media_ref = match self.media.kind {
            MediaKind::Image => MediaRef::Image(media_id),
            MediaKind::Video => MediaRef::Video(media_id),
        };
        let report_id =
            reports::insert_report(&mut *tx, self.user_id, media_ref, &self.location, self.submitted_at)
                .await?;

        tx.commit().await?;

        info!(
            report_id,
            media_id,
            kind = %self.media.kind,
            bytes = self.media.data.len(),
            "Report submitted"
        );

        Ok(StoredSubmission {
            report_id,
            media_id,
        })
    }
}

impl SubmittedMedia {
    fn from_payload(payload: MediaPayload) -> PipelineResult<Self> {
        let kind = match payload.kind.as_deref() {
            Some("image") => MediaKind::Image,
            Some("video") => MediaKind::Video,
            Some(other) => return Err(invalid(format!("media.kind '{}' must be image or video", other))),
            None => return Err(invalid("media.kind is required")),
        };

        let encoded = payload.data.ok_or_else(|| invalid("media.data is required"))?;
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|e| invalid(format!("media.data is not valid base64: {}", e)))?;
        if data.is_empty() {
            return Err(invalid("media.data is empty"));
        }

        let content_type = match payload.content_type.filter(|ct| !ct.trim().is_empty()) {
            Some(ct) => {
                let declared = ct.trim().to_ascii_lowercase();
                let conflicting = match kind {
                    MediaKind::Image => declared.starts_with("video/"),
                    MediaKind::Video => declared.starts_with("image/"),
                };
                if conflicting {
                    return Err(invalid(format!(
                        "media.content_type '{}' contradicts media.kind '{}'",
                        declared, kind
                    )));
                }
                declared
            }
            None => infer::get(&data)
                .map(|t| t.mime_type().to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        };

        let file_name = payload
            .file_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("upload.{}", kind.scratch_extension()));

        Ok(Self {
            kind,
            content_type,
            file_name,
            data,
        })
    }
}
