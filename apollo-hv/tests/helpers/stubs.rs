//! Stand-ins for the classifier and video reader

use apollo_hv::pipeline::frames::Frame;
use apollo_hv::pipeline::{Classifier, FrameStack, RawPrediction, VideoFrameReader};
use apollo_hv::{PipelineError, PipelineResult, VerificationToggle};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Prediction with the given detection and confidence heads and fixed
/// class vectors (arg-max: medium / moderate / high)
pub fn prediction(fire_detected: f64, confidence_score: f64) -> RawPrediction {
    RawPrediction {
        fire_detected,
        confidence_score,
        type_num: [0.05, 0.80, 0.10, 0.05],
        severity_num: [0.10, 0.70, 0.15, 0.05],
        spread_num: [0.05, 0.15, 0.75, 0.05],
    }
}

/// Classifier returning a fixed prediction
///
/// Optional behaviors: panic on the first call, or switch a toggle off
/// while the first report is being classified.
pub struct StubClassifier {
    raw: Mutex<RawPrediction>,
    calls: AtomicUsize,
    panic_on_first: bool,
    disable_on_first: Option<Arc<VerificationToggle>>,
}

impl StubClassifier {
    pub fn new(raw: RawPrediction) -> Self {
        Self {
            raw: Mutex::new(raw),
            calls: AtomicUsize::new(0),
            panic_on_first: false,
            disable_on_first: None,
        }
    }

    pub fn panicking_once(raw: RawPrediction) -> Self {
        Self {
            panic_on_first: true,
            ..Self::new(raw)
        }
    }

    pub fn disabling(raw: RawPrediction, toggle: Arc<VerificationToggle>) -> Self {
        Self {
            disable_on_first: Some(toggle),
            ..Self::new(raw)
        }
    }

    pub fn set_prediction(&self, raw: RawPrediction) {
        *self.raw.lock().unwrap() = raw;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn predict(&self, frames: &FrameStack) -> PipelineResult<RawPrediction> {
        assert_eq!(frames.frames().len(), 3);
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            if self.panic_on_first {
                panic!("model crashed");
            }
            if let Some(toggle) = &self.disable_on_first {
                toggle.disable();
            }
        }
        Ok(self.raw.lock().unwrap().clone())
    }
}

/// Video reader that yields blank frames for a 90-frame clip
pub struct BlankVideoReader;

#[async_trait]
impl VideoFrameReader for BlankVideoReader {
    async fn frame_count(&self, _path: &Path) -> PipelineResult<u64> {
        Ok(90)
    }

    async fn read_frame(&self, _path: &Path, _index: u64) -> PipelineResult<Frame> {
        Ok(Frame::from_image(&image::DynamicImage::new_rgb8(16, 16)))
    }
}

/// Video reader for clips that cannot be decoded at all
pub struct BrokenVideoReader;

#[async_trait]
impl VideoFrameReader for BrokenVideoReader {
    async fn frame_count(&self, _path: &Path) -> PipelineResult<u64> {
        Ok(30)
    }

    async fn read_frame(&self, path: &Path, index: u64) -> PipelineResult<Frame> {
        Err(PipelineError::Inference(format!(
            "cannot decode frame {} of {}",
            index,
            path.display()
        )))
    }
}
