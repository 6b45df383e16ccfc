//! Inference adapter
//!
//! Turns a media input into a [`ClassifierVerdict`]:
//! 1. Decide image vs video (declared type, then magic bytes, then extension)
//! 2. Build the three-frame stack
//! 3. Call the classifier under the configured deadline
//! 4. Threshold and label the raw heads
//!
//! Classification labels are attached only for detected fires. An
//! undetected verdict carries no label keys at all.

use super::classifier::{Classifier, RawPrediction, CLASS_COUNT};
use super::frames::{sample_video, Frame, FrameStack, VideoFrameReader};
use crate::error::{PipelineError, PipelineResult};
use apollo_common::db::{
    FireClassification, FireType, MediaKind, NewVerdict, SeverityLevel, SpreadPotential,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Media handed to the adapter
#[derive(Debug, Clone)]
pub enum MediaInput {
    Path(PathBuf),
    Bytes {
        data: Vec<u8>,
        content_type: Option<String>,
    },
}

/// Thresholded, labelled classifier result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierVerdict {
    pub detected: bool,
    /// `confidence_score * 100`, two decimals
    pub confidence_percentage: f64,
    #[serde(flatten)]
    pub classification: Option<FireClassification>,
}

impl ClassifierVerdict {
    /// Apply the detection threshold (strictly greater) and label maps
    pub fn from_prediction(raw: &RawPrediction, threshold: f64) -> Self {
        let detected = raw.fire_detected > threshold;
        let classification = detected.then(|| FireClassification {
            fire_type: FireType::from_index(argmax(&raw.type_num)).unwrap_or(FireType::None),
            severity_level: SeverityLevel::from_index(argmax(&raw.severity_num))
                .unwrap_or(SeverityLevel::None),
            spread_potential: SpreadPotential::from_index(argmax(&raw.spread_num))
                .unwrap_or(SpreadPotential::None),
        });

        Self {
            detected,
            confidence_percentage: round_percentage(raw.confidence_score),
            classification,
        }
    }

    pub fn into_verdict(self, report_id: i64, verified_at: DateTime<Utc>) -> NewVerdict {
        NewVerdict {
            report_id,
            detected: self.detected,
            confidence_score: self.confidence_percentage,
            verified_at,
            classification: self.classification,
        }
    }
}

/// `round(raw * 100, 2)`
pub fn round_percentage(raw: f64) -> f64 {
    (raw * 100.0 * 100.0).round() / 100.0
}

/// Index of the first maximum
fn argmax(values: &[f64; CLASS_COUNT]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Decide whether an input is a still image or a video
pub async fn detect_kind(input: &MediaInput) -> MediaKind {
    match input {
        MediaInput::Bytes { data, content_type } => {
            if let Some(ct) = content_type.as_deref() {
                if ct.starts_with("image/") {
                    return MediaKind::Image;
                }
                if ct.starts_with("video/") {
                    return MediaKind::Video;
                }
            }
            sniff(infer::get(data)).unwrap_or(MediaKind::Video)
        }
        MediaInput::Path(path) => {
            let sniffed = match tokio::fs::File::open(path).await {
                Ok(file) => read_header(file).await.and_then(|h| sniff(infer::get(&h))),
                Err(_) => None,
            };
            sniffed.unwrap_or_else(|| kind_from_extension(path))
        }
    }
}

fn sniff(kind: Option<infer::Type>) -> Option<MediaKind> {
    match kind?.matcher_type() {
        infer::MatcherType::Image => Some(MediaKind::Image),
        infer::MatcherType::Video => Some(MediaKind::Video),
        _ => None,
    }
}

async fn read_header(mut file: tokio::fs::File) -> Option<Vec<u8>> {
    use tokio::io::AsyncReadExt;
    let mut header = vec![0u8; 8192];
    let n = file.read(&mut header).await.ok()?;
    header.truncate(n);
    Some(header)
}

fn kind_from_extension(path: &Path) -> MediaKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png" | "jpg" | "jpeg") => MediaKind::Image,
        _ => MediaKind::Video,
    }
}

/// Media in, verdict out
pub struct InferenceAdapter {
    classifier: Arc<dyn Classifier>,
    frame_reader: Arc<dyn VideoFrameReader>,
    detection_threshold: f64,
    deadline: Duration,
}

impl InferenceAdapter {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        frame_reader: Arc<dyn VideoFrameReader>,
        detection_threshold: f64,
        deadline: Duration,
    ) -> Self {
        Self {
            classifier,
            frame_reader,
            detection_threshold,
            deadline,
        }
    }

    /// Classify one input within the configured deadline
    pub async fn classify(&self, input: MediaInput) -> PipelineResult<ClassifierVerdict> {
        tokio::time::timeout(self.deadline, self.classify_unbounded(input))
            .await
            .map_err(|_| {
                PipelineError::Inference(format!(
                    "classification exceeded {}s deadline",
                    self.deadline.as_secs_f64()
                ))
            })?
    }

    async fn classify_unbounded(&self, input: MediaInput) -> PipelineResult<ClassifierVerdict> {
        let kind = detect_kind(&input).await;
        debug!(%kind, "Extracting frames");

        let frames = self.load_frames(input, kind).await?;
        let raw = self.classifier.predict(&frames).await?;
        debug!(
            fire_detected = raw.fire_detected,
            confidence_score = raw.confidence_score,
            "Raw prediction"
        );

        Ok(ClassifierVerdict::from_prediction(&raw, self.detection_threshold))
    }

    async fn load_frames(&self, input: MediaInput, kind: MediaKind) -> PipelineResult<FrameStack> {
        match (kind, input) {
            (MediaKind::Image, MediaInput::Path(path)) => {
                let data = tokio::fs::read(&path).await?;
                decode_image(data).await
            }
            (MediaKind::Image, MediaInput::Bytes { data, .. }) => decode_image(data).await,
            (MediaKind::Video, MediaInput::Path(path)) => {
                sample_video(self.frame_reader.as_ref(), &path).await
            }
            (MediaKind::Video, MediaInput::Bytes { data, .. }) => {
                // ffmpeg needs a seekable file
                let spill = tempfile::Builder::new()
                    .prefix("apollo-hv-")
                    .suffix(".mp4")
                    .tempfile()?;
                tokio::fs::write(spill.path(), &data).await?;
                sample_video(self.frame_reader.as_ref(), spill.path()).await
            }
        }
    }
}

async fn decode_image(data: Vec<u8>) -> PipelineResult<FrameStack> {
    let frame = tokio::task::spawn_blocking(move || Frame::decode(&data))
        .await
        .map_err(|e| PipelineError::Inference(format!("image decode task failed: {}", e)))??;
    Ok(FrameStack::replicate(frame))
}
