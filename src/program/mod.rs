// Program module - the exercise sequence a session walks through
//
// This module provides two components:
// 1. TaskDefinition: one exercise (expected labels, hold duration, model)
// 2. TaskProgram: the validated ordered sequence, looping after the last task

pub mod sequence;
pub mod task;

pub use sequence::{TaskProgram, FACING_MODEL};
pub use task::{vocabulary, LabelVocabulary, TaskDefinition};
