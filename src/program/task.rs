// TaskDefinition - static description of one exercise
//
// A task names the pose the participant should hold, the classifier labels
// that count as holding it, and how long it must be held.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Label index to label name mapping, ordered by index
pub type LabelVocabulary = BTreeMap<usize, String>;

/// One exercise instruction in the program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Display identifier, also the correlation key for condition events
    pub name: String,
    /// Label index -> expected label name; any single match satisfies the task
    pub expected_conditions: LabelVocabulary,
    /// Hold duration in whole seconds
    pub duration_secs: u32,
    /// Classification model selector
    pub model_name: String,
    /// Presentation hint, opaque to the core
    #[serde(default)]
    pub icon: String,
    /// Full label vocabulary of the model
    pub index_to_label_map: LabelVocabulary,
    /// Per-label confidence scaling applied before evaluation
    #[serde(default)]
    pub multipliers: HashMap<String, f32>,
}

impl TaskDefinition {
    /// Create a task with an empty multiplier table and no icon
    pub fn new(
        name: impl Into<String>,
        expected_conditions: LabelVocabulary,
        duration_secs: u32,
        model_name: impl Into<String>,
        index_to_label_map: LabelVocabulary,
    ) -> Self {
        Self {
            name: name.into(),
            expected_conditions,
            duration_secs,
            model_name: model_name.into(),
            icon: String::new(),
            index_to_label_map,
            multipliers: HashMap::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_multiplier(mut self, label: impl Into<String>, factor: f32) -> Self {
        self.multipliers.insert(label.into(), factor);
        self
    }

    /// Confidence multiplier for a label name (1.0 when unlisted)
    pub fn multiplier_for(&self, label: &str) -> f32 {
        self.multipliers.get(label).copied().unwrap_or(1.0)
    }

    /// Label name the classifier uses for an index, if the vocabulary has one
    pub fn label_at(&self, index: usize) -> Option<&str> {
        self.index_to_label_map.get(&index).map(String::as_str)
    }

    /// First expected label, used as the pose hint for simulated participants
    pub fn primary_label(&self) -> Option<(usize, &str)> {
        self.expected_conditions
            .iter()
            .next()
            .map(|(index, name)| (*index, name.as_str()))
    }
}

/// Build a vocabulary from `(index, name)` pairs
pub fn vocabulary<I, S>(pairs: I) -> LabelVocabulary
where
    I: IntoIterator<Item = (usize, S)>,
    S: Into<String>,
{
    pairs
        .into_iter()
        .map(|(index, name)| (index, name.into()))
        .collect()
}
