//! services/studio/src/workflow/state.rs
//!
//! The shared state built once at startup: configuration plus the adapters the
//! workflow components are wired to.

use crate::adapters::{FileStore, HttpLessonApi};
use crate::config::Config;
use crate::workflow::autosave::Autosave;
use crate::workflow::health::HealthMonitor;
use crate::workflow::pipeline::LessonPipeline;
use lesson_pipeline_core::ports::{KeyValueStore, LessonApi, PortResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct StudioState {
    pub config: Arc<Config>,
    pub api: Arc<dyn LessonApi>,
    pub store: Arc<dyn KeyValueStore>,
}

impl StudioState {
    /// Wires the HTTP client and the on-disk autosave store from `config`.
    pub fn from_config(config: Arc<Config>) -> PortResult<Self> {
        let api = HttpLessonApi::new(config.api_base_url(), config.request_timeout)?;
        let store = FileStore::new(config.autosave_dir.clone());
        Ok(Self {
            config,
            api: Arc::new(api),
            store: Arc::new(store),
        })
    }

    pub fn pipeline(&self) -> LessonPipeline {
        LessonPipeline::new(self.api.clone())
    }

    pub fn autosave(&self) -> Autosave {
        Autosave::new(self.store.clone())
    }

    pub fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(self.api.clone(), self.config.health_check_interval)
    }
}
