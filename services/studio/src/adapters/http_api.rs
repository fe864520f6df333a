//! services/studio/src/adapters/http_api.rs
//!
//! This module contains the HTTP adapter for the remote lesson generation service.
//! It implements the `LessonApi` port from the `core` crate using `reqwest`, and
//! folds every transport and server failure into a `PortError`.

use async_trait::async_trait;
use lesson_pipeline_core::domain::{
    ExportedLesson, GeneratedLesson, HealthStatus, LessonContent, LessonDetails, LessonRequest,
    SessionId, SessionSnapshot, Slide, SlideEdit, UdlPrinciple,
};
use lesson_pipeline_core::ports::{LessonApi, PortError, PortResult};
use lesson_pipeline_core::validation::ensure_valid_request;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const NO_RESPONSE_MESSAGE: &str =
    "No response from server. Please check your connection and try again.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `LessonApi` port over the service's JSON API.
#[derive(Clone)]
pub struct HttpLessonApi {
    client: Client,
    base_url: String,
}

impl HttpLessonApi {
    /// Creates a new `HttpLessonApi` rooted at `base_url` (e.g. `http://localhost:8000/api`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> PortResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Transport(format!("Request configuration error: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| PortError::Precondition(format!("Invalid service URL '{}': {}", base_url, e)))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// Builds `{base}{route}/{session_id}` with the id percent-encoded as one segment.
    fn session_url(&self, route: &str, session_id: &SessionId) -> PortResult<Url> {
        let mut url = Url::parse(&self.url(route))
            .map_err(|e| PortError::Precondition(format!("Invalid service URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PortError::Precondition("Service URL cannot take a path".to_string()))?
            .push(session_id.as_str());
        Ok(url)
    }

    /// Sends a request and decodes the JSON payload, normalizing every failure mode.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> PortResult<T> {
        debug!(operation, "Sending request to lesson service");
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, operation))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, operation))?;

        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| format!("Server error: {}", status.as_u16()));
            warn!(operation, status = status.as_u16(), %message, "Lesson service rejected request");
            return Err(PortError::Server {
                status: Some(status.as_u16()),
                message,
            });
        }

        let payload: Value =
            serde_json::from_str(&body).map_err(|e| malformed_response(status, operation, e))?;

        // The service reports some failures inside a 2xx body.
        if payload.get("success").and_then(Value::as_bool) == Some(false) {
            let message = message_from(&payload)
                .unwrap_or_else(|| format!("The lesson service could not complete {}", operation));
            warn!(operation, %message, "Lesson service reported failure");
            return Err(PortError::Server {
                status: Some(status.as_u16()),
                message,
            });
        }

        serde_json::from_value(payload).map_err(|e| malformed_response(status, operation, e))
    }
}

fn transport_error(err: reqwest::Error, operation: &str) -> PortError {
    error!(operation, error = %err, "Lesson service request failed");
    if err.is_builder() {
        PortError::Transport(format!("Request configuration error: {}", err))
    } else {
        PortError::Transport(NO_RESPONSE_MESSAGE.to_string())
    }
}

fn malformed_response(status: StatusCode, operation: &str, err: serde_json::Error) -> PortError {
    error!(operation, error = %err, "Lesson service returned an unreadable body");
    PortError::Server {
        status: Some(status.as_u16()),
        message: format!("Malformed response from server: {}", err),
    }
}

/// Pulls a human-readable message out of an error body, preferring `detail`.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|payload| message_from(&payload))
}

fn message_from(payload: &Value) -> Option<String> {
    ["detail", "message"].into_iter().find_map(|key| match payload.get(key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    })
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct BaselineRecord {
    session_id: String,
    lesson_content: LessonContent,
}
impl BaselineRecord {
    fn to_domain(self) -> PortResult<GeneratedLesson> {
        let session_id = SessionId::new(self.session_id).map_err(|_| PortError::Server {
            status: None,
            message: "The lesson service returned an empty session id".to_string(),
        })?;
        Ok(GeneratedLesson {
            session_id,
            lesson_content: self.lesson_content,
        })
    }
}

#[derive(Deserialize)]
struct SessionRecord {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    stage: String,
    lesson_content: LessonContent,
    #[serde(default)]
    available_next_stages: Vec<String>,
}
impl SessionRecord {
    fn to_domain(self, requested: &SessionId) -> SessionSnapshot {
        let session_id = self
            .session_id
            .and_then(|raw| SessionId::new(raw).ok())
            .unwrap_or_else(|| requested.clone());
        SessionSnapshot {
            session_id,
            stage: self.stage,
            lesson_content: self.lesson_content,
            available_next_stages: self.available_next_stages,
        }
    }
}

#[derive(Deserialize)]
struct SlideRecord {
    slide: Slide,
}

#[derive(Deserialize)]
struct PrincipleRecord {
    lesson_content: LessonContent,
}

#[derive(Deserialize)]
struct ExportRecord {
    download_url: String,
    #[serde(default)]
    lesson_details: Option<LessonDetails>,
}
impl ExportRecord {
    fn to_domain(self) -> ExportedLesson {
        ExportedLesson {
            download_url: self.download_url,
            lesson_details: self.lesson_details,
        }
    }
}

#[derive(Serialize)]
struct SlideEditBody<'a> {
    slide_index: usize,
    #[serde(flatten)]
    edit: &'a SlideEdit,
}

#[derive(Serialize)]
struct SlideEnhanceBody<'a> {
    slide_index: usize,
    prompt: &'a str,
}

#[derive(Serialize)]
struct PrincipleBody<'a> {
    principle: UdlPrinciple,
    custom_requirements: Option<&'a str>,
}

/// Encodes the lesson form as the multipart body the baseline endpoint expects.
fn baseline_form(request: &LessonRequest) -> PortResult<Form> {
    let mut form = Form::new()
        .text("topic", request.topic.clone())
        .text("chapter", request.chapter.clone())
        .text("lesson_title", request.lesson_title.clone())
        .text("grade_level", request.grade_level.clone())
        .text("learning_objectives", request.learning_objectives.clone())
        .text("duration", request.duration.clone())
        .text("complexity_level", request.complexity_level.0.to_string());

    if let Some(file) = &request.file {
        let part = Part::bytes(file.data.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| {
                PortError::Validation(vec![format!(
                    "File type '{}' is not a valid MIME type: {}",
                    file.mime_type, e
                )])
            })?;
        form = form.part("file", part);
    }

    Ok(form)
}

//=========================================================================================
// `LessonApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl LessonApi for HttpLessonApi {
    async fn generate_baseline(&self, request: &LessonRequest) -> PortResult<GeneratedLesson> {
        ensure_valid_request(request)?;
        let form = baseline_form(request)?;
        info!("Requesting baseline lesson for '{}'", request.lesson_title);

        let record: BaselineRecord = self
            .send(
                self.client.post(self.url("/generate-baseline")).multipart(form),
                "generate-baseline",
            )
            .await?;
        let generated = record.to_domain()?;
        info!(
            session_id = %generated.session_id,
            slides = generated.lesson_content.slide_count(),
            "Baseline lesson generated"
        );
        Ok(generated)
    }

    async fn get_session(&self, session_id: &SessionId) -> PortResult<SessionSnapshot> {
        let url = self.session_url("/lesson-session", session_id)?;
        let record: SessionRecord = self.send(self.client.get(url), "lesson-session").await?;
        Ok(record.to_domain(session_id))
    }

    async fn edit_slide(
        &self,
        session_id: &SessionId,
        slide_index: usize,
        edit: &SlideEdit,
    ) -> PortResult<Slide> {
        let url = self.session_url("/edit-slide", session_id)?;
        let body = SlideEditBody { slide_index, edit };
        let record: SlideRecord = self
            .send(self.client.post(url).json(&body), "edit-slide")
            .await?;
        Ok(record.slide)
    }

    async fn ai_enhance_slide(
        &self,
        session_id: &SessionId,
        slide_index: usize,
        prompt: &str,
    ) -> PortResult<Slide> {
        let url = self.session_url("/ai-enhance-slide", session_id)?;
        let body = SlideEnhanceBody {
            slide_index,
            prompt,
        };
        let record: SlideRecord = self
            .send(self.client.post(url).json(&body), "ai-enhance-slide")
            .await?;
        Ok(record.slide)
    }

    async fn apply_udl_principle(
        &self,
        session_id: &SessionId,
        principle: UdlPrinciple,
        custom_requirements: Option<&str>,
    ) -> PortResult<LessonContent> {
        let url = self.session_url("/apply-udl-principle", session_id)?;
        let body = PrincipleBody {
            principle,
            custom_requirements,
        };
        info!(%session_id, %principle, "Applying UDL principle");
        let record: PrincipleRecord = self
            .send(self.client.post(url).json(&body), "apply-udl-principle")
            .await?;
        Ok(record.lesson_content)
    }

    async fn export_lesson(&self, session_id: &SessionId) -> PortResult<ExportedLesson> {
        let url = self.session_url("/export-lesson", session_id)?;
        let record: ExportRecord = self.send(self.client.post(url), "export-lesson").await?;
        info!(%session_id, download_url = %record.download_url, "Lesson exported");
        Ok(record.to_domain())
    }

    async fn delete_session(&self, session_id: &SessionId) -> PortResult<()> {
        let url = self.session_url("/lesson-session", session_id)?;
        let _ack: Value = self
            .send(self.client.delete(url), "delete-lesson-session")
            .await?;
        info!(%session_id, "Lesson session deleted");
        Ok(())
    }

    async fn health_check(&self) -> PortResult<HealthStatus> {
        self.send(self.client.get(self.url("/health")), "health")
            .await
    }
}
