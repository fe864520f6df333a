//! crates/lesson_pipeline_core/src/validation.rs
//!
//! Local checks that run before anything is sent to the generation service.

use crate::domain::{ComplexityLevel, LessonRequest, SessionId};
use crate::ports::{PortError, PortResult};

/// Largest attachment the service accepts: 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// MIME types accepted for the optional attachment.
pub const ALLOWED_UPLOAD_TYPES: [&str; 7] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "image/jpeg",
    "image/jpg",
    "image/png",
];

/// Checks every form rule and returns all violations, in form order.
/// An empty list means the request may be submitted.
pub fn validate_lesson_request(request: &LessonRequest) -> Vec<String> {
    let required = [
        (&request.topic, "Topic is required"),
        (&request.chapter, "Chapter/Unit is required"),
        (&request.lesson_title, "Lesson title is required"),
        (&request.grade_level, "Grade level is required"),
        (&request.learning_objectives, "Learning objectives are required"),
        (&request.duration, "Duration is required"),
    ];

    let mut errors: Vec<String> = required
        .into_iter()
        .filter(|(value, _)| value.trim().is_empty())
        .map(|(_, message)| message.to_string())
        .collect();

    if !request.complexity_level.is_in_range() {
        errors.push(format!(
            "Complexity level must be between {} and {}",
            ComplexityLevel::MIN,
            ComplexityLevel::MAX
        ));
    }

    if let Some(file) = &request.file {
        if file.size() > MAX_UPLOAD_BYTES {
            errors.push("File size must be less than 10MB".to_string());
        }
        if !ALLOWED_UPLOAD_TYPES.contains(&file.mime_type.as_str()) {
            errors.push(
                "File must be PDF, Word document, text file, or image (JPG/PNG)".to_string(),
            );
        }
    }

    errors
}

/// Like [`validate_lesson_request`], but as a `Result` for `?` chains.
pub fn ensure_valid_request(request: &LessonRequest) -> PortResult<()> {
    let errors = validate_lesson_request(request);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PortError::Validation(errors))
    }
}

pub fn validate_session_id(session_id: Option<&str>) -> PortResult<SessionId> {
    match session_id {
        Some(raw) => SessionId::new(raw),
        None => Err(PortError::Precondition(
            "Valid session ID is required".to_string(),
        )),
    }
}

pub fn validate_slide_index(slide_index: usize, slide_count: usize) -> PortResult<()> {
    if slide_count == 0 {
        return Err(PortError::Precondition(
            "The lesson has no slides to edit".to_string(),
        ));
    }
    if slide_index >= slide_count {
        return Err(PortError::Precondition(format!(
            "Slide index must be between 0 and {}",
            slide_count - 1
        )));
    }
    Ok(())
}
