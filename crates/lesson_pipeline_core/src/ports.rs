//! crates/lesson_pipeline_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the lesson pipeline.
//! The remote generation service and the local snapshot cache sit behind these
//! traits so the workflow logic never depends on a concrete transport or store.

use async_trait::async_trait;

use crate::domain::{
    ExportedLesson, GeneratedLesson, HealthStatus, LessonContent, LessonRequest, SessionId,
    SessionSnapshot, Slide, SlideEdit, UdlPrinciple,
};

//=========================================================================================
// Port Error and Result Types
//=========================================================================================

/// The single error shape for every pipeline operation.
///
/// `Precondition` and `Validation` are decided locally and never reach the network.
/// `Transport` and `Server` come back from a request that was actually sent.
/// `Storage` is only produced by local `KeyValueStore` backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("{0}")]
    Precondition(String),
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Server {
        status: Option<u16>,
        message: String,
    },
    #[error("Local storage error: {0}")]
    Storage(String),
}

impl PortError {
    /// The request left the client but no response came back.
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server { status: Some(code), .. } if *code >= 500)
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Server { status: Some(code), .. } if (400..500).contains(code))
    }

    /// A message suitable for showing to the person driving the workflow.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            "An unexpected error occurred. Please try again.".to_string()
        } else {
            message
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote lesson generation and enhancement service.
#[async_trait]
pub trait LessonApi: Send + Sync {
    /// Submits the lesson form and returns the new session with its baseline deck.
    async fn generate_baseline(&self, request: &LessonRequest) -> PortResult<GeneratedLesson>;

    async fn get_session(&self, session_id: &SessionId) -> PortResult<SessionSnapshot>;

    /// Overwrites the editable fields of one slide and returns the stored slide.
    async fn edit_slide(
        &self,
        session_id: &SessionId,
        slide_index: usize,
        edit: &SlideEdit,
    ) -> PortResult<Slide>;

    /// Asks the service to rework one slide following a free-text instruction.
    async fn ai_enhance_slide(
        &self,
        session_id: &SessionId,
        slide_index: usize,
        prompt: &str,
    ) -> PortResult<Slide>;

    /// Runs one UDL enhancement pass over the whole lesson.
    async fn apply_udl_principle(
        &self,
        session_id: &SessionId,
        principle: UdlPrinciple,
        custom_requirements: Option<&str>,
    ) -> PortResult<LessonContent>;

    async fn export_lesson(&self, session_id: &SessionId) -> PortResult<ExportedLesson>;

    async fn delete_session(&self, session_id: &SessionId) -> PortResult<()>;

    async fn health_check(&self) -> PortResult<HealthStatus>;
}

/// A string key-value store used for best-effort local snapshots.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;

    /// Every key currently held by the store.
    async fn keys(&self) -> PortResult<Vec<String>>;
}
