// Weighting - per-task confidence multipliers and label resolution
//
// Scores outside the task vocabulary are ignored. Each remaining score is
// scaled by the multiplier for its label name (1.0 when unlisted) and the
// single highest weighted score becomes the observed label.

use std::collections::HashMap;

use crate::classification::{LabelMap, LabelScores};
use crate::program::LabelVocabulary;

/// Resolve raw scores to a one-entry label map
///
/// # Returns
/// * `Some(map)` - `{winner_index: winner_name}`
/// * `None` - no in-vocabulary score, a non-finite score, or an exact tie for first place
pub fn weighted_label_map(
    scores: &LabelScores,
    labels: &LabelVocabulary,
    multipliers: &HashMap<String, f32>,
) -> Option<LabelMap> {
    let mut best: Option<(usize, &str, f32)> = None;
    let mut tied = false;

    for (index, score) in scores {
        let Some(name) = labels.get(index) else {
            continue;
        };
        let weighted = score * multipliers.get(name).copied().unwrap_or(1.0);
        if !weighted.is_finite() {
            return None;
        }

        match best.map(|(_, _, top)| top) {
            Some(top) if weighted < top => {}
            Some(top) if weighted == top => tied = true,
            _ => {
                best = Some((*index, name.as_str(), weighted));
                tied = false;
            }
        }
    }

    if tied {
        return None;
    }

    best.map(|(index, name, _)| LabelMap::from([(index, name.to_string())]))
}
