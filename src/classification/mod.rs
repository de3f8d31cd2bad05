//! Classification boundary between captured frames and the task runner.
//!
//! The inference engine itself is an external collaborator. This module fixes
//! the contract the session talks to ([`ClassificationAdapter`]) and provides a
//! score-based adapter ([`ScoringAdapter`]) that applies per-task confidence
//! multipliers before resolving a single label.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::ClassificationError;
use crate::program::{LabelVocabulary, TaskDefinition};

pub mod scoring;
pub mod weighting;

pub use scoring::{ScoreModel, ScoringAdapter};
pub use weighting::weighted_label_map;

/// Label index -> label name as observed by the classifier
pub type LabelMap = BTreeMap<usize, String>;

/// Raw label index -> confidence as produced by a model
pub type LabelScores = BTreeMap<usize, f32>;

/// A captured camera frame. The pixel payload is opaque to the core.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
            captured_at: Instant::now(),
        }
    }

    /// Zero-sized placeholder frame, used by simulations and tests
    pub fn blank() -> Self {
        Self::new(0, 0, Vec::new())
    }
}

/// Everything an adapter needs to classify one frame for one task
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    /// Monotonic request id assigned by the session
    pub id: u64,
    pub frame: Frame,
    pub model_name: String,
    /// Task the request was issued for; results carry it back as a correlation tag
    pub task_name: String,
    pub labels: Arc<LabelVocabulary>,
    pub multipliers: Arc<HashMap<String, f32>>,
}

impl ClassificationRequest {
    pub fn for_task(id: u64, frame: Frame, task: &TaskDefinition) -> Self {
        Self {
            id,
            frame,
            model_name: task.model_name.clone(),
            task_name: task.name.clone(),
            labels: Arc::new(task.index_to_label_map.clone()),
            multipliers: Arc::new(task.multipliers.clone()),
        }
    }
}

/// External inference collaborator
///
/// Implementations may run their work anywhere; the returned future must be
/// `Send` so the session can drive it on a worker task. The session bounds
/// every call with a timeout.
pub trait ClassificationAdapter: Send + Sync + 'static {
    fn classify(
        &self,
        request: ClassificationRequest,
    ) -> BoxFuture<'static, Result<LabelMap, ClassificationError>>;
}

impl<T: ClassificationAdapter + ?Sized> ClassificationAdapter for Arc<T> {
    fn classify(
        &self,
        request: ClassificationRequest,
    ) -> BoxFuture<'static, Result<LabelMap, ClassificationError>> {
        (**self).classify(request)
    }
}

/// Outcome of one classification request, as reported on the event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationOutcome {
    Labels { labels: LabelMap },
    Failed { code: i32, message: String },
}
