//! Report verification pipeline
//!
//! Stages, in the order the scheduler drives them:
//! - [`media_fetcher`]: blob lookup and scratch materialization
//! - [`inference`]: frame extraction plus classification
//! - [`state_machine`]: verdict write and status transition
//!
//! Storage and model access go through the traits in [`store`] and
//! [`classifier`] so each stage can run against stubs.

pub mod classifier;
pub mod frames;
pub mod inference;
pub mod media_fetcher;
pub mod state_machine;
pub mod store;

pub use classifier::{Classifier, HttpClassifier, RawPrediction};
pub use frames::{FfmpegFrameReader, FrameStack, VideoFrameReader};
pub use inference::{ClassifierVerdict, InferenceAdapter, MediaInput};
pub use media_fetcher::{MediaFetcher, ScratchFile};
pub use state_machine::ReportStateMachine;
pub use store::{BlobStore, ReportStore};
