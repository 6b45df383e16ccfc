//! Frame extraction
//!
//! Every classification input is a stack of three RGB frames, 224x224,
//! channel values scaled to [0, 1]. Images are decoded once and repeated;
//! videos are sampled at three evenly spaced positions through `ffmpeg`.

use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Edge length of a model input frame
pub const FRAME_SIZE: u32 = 224;

/// Frames per classification input
pub const FRAMES_PER_STACK: usize = 3;

/// One normalized RGB frame, row-major HWC
#[derive(Debug, Clone, PartialEq)]
pub struct Frame(Vec<f32>);

impl Frame {
    pub fn from_image(img: &DynamicImage) -> Self {
        let rgb = img
            .resize_exact(FRAME_SIZE, FRAME_SIZE, FilterType::Triangle)
            .to_rgb8();
        Frame(rgb.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect())
    }

    /// Decode an encoded still image
    pub fn decode(bytes: &[u8]) -> PipelineResult<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| PipelineError::Inference(format!("image decode failed: {}", e)))?;
        Ok(Self::from_image(&img))
    }

    /// `[r, g, b]` at row `y`, column `x`
    pub fn pixel(&self, y: usize, x: usize) -> [f32; 3] {
        let i = (y * FRAME_SIZE as usize + x) * 3;
        [self.0[i], self.0[i + 1], self.0[i + 2]]
    }

    fn rows(&self) -> Vec<Vec<[f32; 3]>> {
        self.0
            .chunks_exact(FRAME_SIZE as usize * 3)
            .map(|row| row.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect())
            .collect()
    }
}

/// Model input: exactly [`FRAMES_PER_STACK`] frames
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    /// Same frame three times
    pub fn replicate(frame: Frame) -> Self {
        Self {
            frames: vec![frame; FRAMES_PER_STACK],
        }
    }

    /// Build from sampled frames, repeating the last one when short
    pub fn from_frames(mut frames: Vec<Frame>) -> Option<Self> {
        let last = frames.last()?.clone();
        frames.truncate(FRAMES_PER_STACK);
        frames.resize(FRAMES_PER_STACK, last);
        Some(Self { frames })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Nested `[frame][row][col][channel]` form for JSON transport
    pub fn to_instance(&self) -> Vec<Vec<Vec<[f32; 3]>>> {
        self.frames.iter().map(Frame::rows).collect()
    }
}

/// Sample positions for a video of `total` frames
///
/// `min(i * (total / 3), total - 1)` for i in 0..3, integer division.
pub fn sample_positions(total: u64) -> [u64; FRAMES_PER_STACK] {
    let step = total / FRAMES_PER_STACK as u64;
    let last = total.saturating_sub(1);
    [0, 1, 2].map(|i| (i * step).min(last))
}

/// Video access needed for sampling
#[async_trait]
pub trait VideoFrameReader: Send + Sync {
    async fn frame_count(&self, path: &Path) -> PipelineResult<u64>;

    async fn read_frame(&self, path: &Path, index: u64) -> PipelineResult<Frame>;
}

/// Sample three frames from a video, skipping unreadable positions
pub async fn sample_video(reader: &dyn VideoFrameReader, path: &Path) -> PipelineResult<FrameStack> {
    let no_frames = || PipelineError::NoFramesExtracted(path.display().to_string());

    let total = reader.frame_count(path).await?;
    if total == 0 {
        return Err(no_frames());
    }

    let mut frames = Vec::with_capacity(FRAMES_PER_STACK);
    for index in sample_positions(total) {
        match reader.read_frame(path, index).await {
            Ok(frame) => frames.push(frame),
            Err(e) => debug!(index, "Skipping unreadable frame: {}", e),
        }
    }

    FrameStack::from_frames(frames).ok_or_else(no_frames)
}

/// `ffprobe`/`ffmpeg` backed reader
#[derive(Debug, Clone)]
pub struct FfmpegFrameReader {
    ffprobe_bin: PathBuf,
    ffmpeg_bin: PathBuf,
}

impl Default for FfmpegFrameReader {
    fn default() -> Self {
        Self {
            ffprobe_bin: PathBuf::from("ffprobe"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegFrameReader {
    pub fn new(ffprobe_bin: impl Into<PathBuf>, ffmpeg_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_bin: ffprobe_bin.into(),
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }
}

#[async_trait]
impl VideoFrameReader for FfmpegFrameReader {
    async fn frame_count(&self, path: &Path) -> PipelineResult<u64> {
        let output = Command::new(&self.ffprobe_bin)
            .args(["-v", "error", "-select_streams", "v:0", "-count_packets"])
            .args(["-show_entries", "stream=nb_read_packets", "-of", "csv=p=0"])
            .arg(path)
            .output()
            .await
            .map_err(|e| PipelineError::Inference(format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(PipelineError::Inference(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .trim_end_matches(',')
            .parse::<u64>()
            .map_err(|_| PipelineError::Inference(format!("unexpected ffprobe frame count '{}'", text.trim())))
    }

    async fn read_frame(&self, path: &Path, index: u64) -> PipelineResult<Frame> {
        let output = Command::new(&self.ffmpeg_bin)
            .args(["-v", "error", "-i"])
            .arg(path)
            .arg("-vf")
            .arg(format!("select=eq(n\\,{})", index))
            .args(["-vframes", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .output()
            .await
            .map_err(|e| PipelineError::Inference(format!("failed to run ffmpeg: {}", e)))?;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(PipelineError::Inference(format!(
                "ffmpeg produced no frame {} for {}",
                index,
                path.display()
            )));
        }

        Frame::decode(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    /// Frames are solid gray with value = index; `bad` indices fail
    struct StubReader {
        total: u64,
        bad: Vec<u64>,
    }

    #[async_trait]
    impl VideoFrameReader for StubReader {
        async fn frame_count(&self, _path: &Path) -> PipelineResult<u64> {
            Ok(self.total)
        }

        async fn read_frame(&self, _path: &Path, index: u64) -> PipelineResult<Frame> {
            if self.bad.contains(&index) {
                return Err(PipelineError::Inference("corrupt".to_string()));
            }
            let v = index as u8;
            Frame::decode(&png(4, 4, [v, v, v]))
        }
    }

    #[test]
    fn test_sample_positions() {
        assert_eq!(sample_positions(300), [0, 100, 200]);
        assert_eq!(sample_positions(10), [0, 3, 6]);
        assert_eq!(sample_positions(2), [0, 0, 0]);
        assert_eq!(sample_positions(1), [0, 0, 0]);
    }

    #[test]
    fn test_image_is_resized_and_normalized() {
        let frame = Frame::decode(&png(40, 30, [255, 0, 51])).unwrap();
        let stack = FrameStack::replicate(frame);
        assert_eq!(stack.frames().len(), 3);

        let instance = stack.to_instance();
        assert_eq!(instance.len(), 3);
        assert_eq!(instance[0].len(), 224);
        assert_eq!(instance[0][0].len(), 224);

        let [r, g, b] = stack.frames()[2].pixel(100, 200);
        assert!((r - 1.0).abs() < 1e-6);
        assert!(g.abs() < 1e-6);
        assert!((b - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_undecodable_image_is_inference_error() {
        assert!(matches!(
            Frame::decode(b"not an image"),
            Err(PipelineError::Inference(_))
        ));
    }

    #[tokio::test]
    async fn test_video_skips_unreadable_samples() {
        let reader = StubReader { total: 30, bad: vec![10] };
        let stack = sample_video(&reader, Path::new("clip.mp4")).await.unwrap();

        let first = stack.frames()[0].pixel(0, 0)[0];
        let second = stack.frames()[1].pixel(0, 0)[0];
        assert!(first.abs() < 1e-6);
        assert!((second - 20.0 / 255.0).abs() < 1e-6);
        assert_eq!(stack.frames()[1], stack.frames()[2]);
    }

    #[tokio::test]
    async fn test_video_without_frames_fails() {
        let reader = StubReader { total: 9, bad: vec![0, 3, 6] };
        let err = sample_video(&reader, Path::new("clip.mp4")).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoFramesExtracted(_)));

        let empty = StubReader { total: 0, bad: vec![] };
        let err = sample_video(&empty, Path::new("clip.mp4")).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoFramesExtracted(_)));
    }
}
