// ScoringAdapter - adapter over a model that reports raw label scores
//
// Models produce an index -> confidence distribution. The adapter applies the
// request's multipliers and resolves a single label through the weighting
// stage, so the evaluator only ever sees label names.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::classification::weighting::weighted_label_map;
use crate::classification::{
    ClassificationAdapter, ClassificationRequest, Frame, LabelMap, LabelScores,
};
use crate::error::ClassificationError;

/// Inference engine producing raw scores for a frame
pub trait ScoreModel: Send + Sync + 'static {
    fn infer(
        &self,
        frame: Frame,
        model_name: &str,
    ) -> BoxFuture<'static, Result<LabelScores, ClassificationError>>;
}

/// [`ClassificationAdapter`] that weights [`ScoreModel`] output per task
pub struct ScoringAdapter<M> {
    model: Arc<M>,
}

impl<M: ScoreModel> ScoringAdapter<M> {
    pub fn new(model: M) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    pub fn from_arc(model: Arc<M>) -> Self {
        Self { model }
    }
}

impl<M: ScoreModel> ClassificationAdapter for ScoringAdapter<M> {
    fn classify(
        &self,
        request: ClassificationRequest,
    ) -> BoxFuture<'static, Result<LabelMap, ClassificationError>> {
        let inference = self.model.infer(request.frame, &request.model_name);
        let model_name = request.model_name;
        let labels = request.labels;
        let multipliers = request.multipliers;

        async move {
            let scores = inference.await?;
            weighted_label_map(&scores, &labels, &multipliers)
                .ok_or(ClassificationError::Ambiguous { model: model_name })
        }
        .boxed()
    }
}
