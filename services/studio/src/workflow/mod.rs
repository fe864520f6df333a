pub mod autosave;
pub mod health;
pub mod pipeline;
pub mod state;

pub use autosave::{Autosave, AutosaveSnapshot};
pub use health::{HealthMonitor, HealthReading, MIN_CHECK_INTERVAL};
pub use pipeline::{LessonPipeline, Resumed, SlideAction, SlideCall, SlideOutcome};
pub use state::StudioState;
