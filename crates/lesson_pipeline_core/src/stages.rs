//! crates/lesson_pipeline_core/src/stages.rs
//!
//! Pure stage-progression rules. The caller owns the current stage; these
//! functions only answer questions about it.

use crate::domain::{LessonContent, Stage};

/// Position of `stage` in the six-stage sequence as a fraction in `(0, 1]`.
pub fn progress_fraction(stage: Stage) -> f64 {
    (stage.index() + 1) as f64 / Stage::ALL.len() as f64
}

/// Same as [`progress_fraction`] for a stage name; unknown names report `0.0`.
pub fn progress_fraction_of(name: &str) -> f64 {
    Stage::from_name(name).map_or(0.0, progress_fraction)
}

/// Progress rounded to a whole percentage.
pub fn progress_percent(stage: Stage) -> u8 {
    (progress_fraction(stage) * 100.0).round() as u8
}

pub fn next_stage(stage: Stage) -> Option<Stage> {
    Stage::ALL.get(stage.index() + 1).copied()
}

pub fn previous_stage(stage: Stage) -> Option<Stage> {
    stage.index().checked_sub(1).and_then(|i| Stage::ALL.get(i).copied())
}

pub fn next_stage_of(name: &str) -> Option<Stage> {
    Stage::from_name(name).and_then(next_stage)
}

pub fn previous_stage_of(name: &str) -> Option<Stage> {
    Stage::from_name(name).and_then(previous_stage)
}

/// The stages reachable from `stage` in one step.
pub fn available_next_stages(stage: Stage) -> Vec<Stage> {
    next_stage(stage).into_iter().collect()
}

/// Whether the workflow may leave `stage` given the lesson currently held.
///
/// Leaving `form` only happens through a baseline submission, so it is never
/// allowed here. Leaving an enhancement stage requires that its principle has
/// already been applied by the server.
pub fn can_advance(stage: Stage, content: Option<&LessonContent>) -> bool {
    let Some(content) = content else {
        return false;
    };
    match stage {
        Stage::Form | Stage::Export => false,
        Stage::Baseline => !content.slides.is_empty(),
        Stage::Engagement | Stage::Representation | Stage::ActionExpression => stage
            .principle()
            .is_some_and(|principle| content.has_applied(principle)),
    }
}

/// Same as [`can_advance`] for a stage name; unknown names are never advanceable.
pub fn can_advance_from(name: &str, content: Option<&LessonContent>) -> bool {
    Stage::from_name(name).is_some_and(|stage| can_advance(stage, content))
}
