//! crates/lesson_pipeline_core/src/domain.rs
//!
//! Defines the core data structures for the lesson pipeline.
//! Lesson content arrives from the generation service as JSON, so the records
//! derive serde with permissive defaults for every optional field.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::ports::{PortError, PortResult};

//=========================================================================================
// Session Identifier
//=========================================================================================

/// The opaque identifier the generation service hands out for one lesson session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a raw id, rejecting empty or whitespace-only values.
    pub fn new(raw: impl Into<String>) -> PortResult<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(PortError::Precondition(
                "Valid session ID is required".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = PortError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//=========================================================================================
// UDL Principles and Pipeline Stages
//=========================================================================================

/// One of the three Universal Design for Learning enhancement passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UdlPrinciple {
    Engagement,
    Representation,
    ActionExpression,
}

impl UdlPrinciple {
    /// All principles in the order the pipeline applies them.
    pub const ALL: [UdlPrinciple; 3] = [
        UdlPrinciple::Engagement,
        UdlPrinciple::Representation,
        UdlPrinciple::ActionExpression,
    ];

    /// The identifier used on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Engagement => "engagement",
            Self::Representation => "representation",
            Self::ActionExpression => "action_expression",
        }
    }

    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Engagement => "Engagement",
            Self::Representation => "Representation",
            Self::ActionExpression => "Action & Expression",
        }
    }

    /// The three UDL guidelines that make up this principle.
    pub const fn guidelines(&self) -> [&'static str; 3] {
        match self {
            Self::Engagement => [
                "Provide options for recruiting interest",
                "Provide options for sustaining effort and persistence",
                "Provide options for self-regulation",
            ],
            Self::Representation => [
                "Provide options for perception",
                "Provide options for language, expressions, and symbols",
                "Provide options for comprehension",
            ],
            Self::ActionExpression => [
                "Provide options for physical action",
                "Provide options for expression and communication",
                "Provide options for executive functions",
            ],
        }
    }
}

impl fmt::Display for UdlPrinciple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UdlPrinciple {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| PortError::Precondition(format!("Invalid UDL principle: {s}")))
    }
}

/// A position in the lesson workflow. Exactly one stage is current at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Form,
    Baseline,
    Engagement,
    Representation,
    ActionExpression,
    Export,
}

impl Stage {
    /// The fixed stage sequence, in workflow order.
    pub const ALL: [Stage; 6] = [
        Stage::Form,
        Stage::Baseline,
        Stage::Engagement,
        Stage::Representation,
        Stage::ActionExpression,
        Stage::Export,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Baseline => "baseline",
            Self::Engagement => "engagement",
            Self::Representation => "representation",
            Self::ActionExpression => "action_expression",
            Self::Export => "export",
        }
    }

    /// Looks a stage up by its wire name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Zero-based position in [`Stage::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Form => "Setup",
            Self::Baseline => "Baseline",
            Self::Engagement => "Engagement",
            Self::Representation => "Representation",
            Self::ActionExpression => "Action & Expression",
            Self::Export => "Export",
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            Self::Form => "Create your lesson parameters",
            Self::Baseline => "Review initial lesson content",
            Self::Engagement => "Add UDL engagement principles",
            Self::Representation => "Add multiple representation modes",
            Self::ActionExpression => "Add expression options",
            Self::Export => "Download your lesson",
        }
    }

    /// The UDL principle applied on entry to this stage, if any.
    pub const fn principle(&self) -> Option<UdlPrinciple> {
        match self {
            Self::Engagement => Some(UdlPrinciple::Engagement),
            Self::Representation => Some(UdlPrinciple::Representation),
            Self::ActionExpression => Some(UdlPrinciple::ActionExpression),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Lesson Request (form input)
//=========================================================================================

/// The grade levels offered by the lesson form, K-12 through graduate study.
pub const GRADE_LEVEL_OPTIONS: [&str; 18] = [
    "K",
    "1",
    "2",
    "3",
    "4",
    "5",
    "6",
    "7",
    "8",
    "9",
    "10",
    "11",
    "12",
    "College Freshman",
    "College Sophomore",
    "College Junior",
    "College Senior",
    "Graduate",
];

/// Groups a free-form grade level into a broad schooling band.
pub fn grade_category(grade_level: &str) -> &'static str {
    let grade = grade_level.trim().to_lowercase();
    if matches!(grade.as_str(), "k" | "1" | "2" | "3" | "4" | "5") || grade.contains("elementary")
    {
        "Elementary (K-5)"
    } else if matches!(grade.as_str(), "6" | "7" | "8") || grade.contains("middle") {
        "Middle School (6-8)"
    } else if matches!(grade.as_str(), "9" | "10" | "11" | "12") || grade.contains("high") {
        "High School (9-12)"
    } else if grade.contains("college") || grade.contains("university") || grade.contains("graduate")
    {
        "University Level"
    } else {
        "Not specified"
    }
}

/// How demanding the generated material should be, on a 1-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplexityLevel(pub u8);

impl ComplexityLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn is_in_range(&self) -> bool {
        (Self::MIN..=Self::MAX).contains(&self.0)
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            0..=3 => "Basic",
            4..=6 => "Intermediate",
            _ => "Advanced",
        }
    }
}

impl Default for ComplexityLevel {
    fn default() -> Self {
        Self(5)
    }
}

/// A file attached to the lesson form, e.g. a reading or worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Guesses a MIME type from a file name's extension.
    pub fn mime_type_for(file_name: &str) -> &'static str {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => "application/pdf",
            "doc" => "application/msword",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "txt" => "text/plain",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            _ => "application/octet-stream",
        }
    }
}

/// The lesson parameters collected by the form. Immutable once submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LessonRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub chapter: String,
    #[serde(default)]
    pub lesson_title: String,
    /// The college variant of the form calls this `course_level`.
    #[serde(default, alias = "course_level")]
    pub grade_level: String,
    /// Newline-delimited list of objectives.
    #[serde(default)]
    pub learning_objectives: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub complexity_level: ComplexityLevel,
    #[serde(skip)]
    pub file: Option<UploadFile>,
}

impl LessonRequest {
    /// The individual objectives, one per non-blank line.
    pub fn learning_objective_items(&self) -> Vec<&str> {
        self.learning_objectives
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    pub fn with_file(mut self, file: UploadFile) -> Self {
        self.file = Some(file);
        self
    }
}

//=========================================================================================
// Lesson Content (service output)
//=========================================================================================

/// Treats an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One slide of the generated deck.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_prompt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub accessibility_features: BTreeMap<String, String>,
    /// Principle name -> enhancement descriptions, in the order they were added.
    #[serde(default, deserialize_with = "null_as_default")]
    pub udl_enhancements: BTreeMap<String, Vec<String>>,
}

impl Slide {
    /// The editable fields of this slide.
    pub fn to_edit(&self) -> SlideEdit {
        SlideEdit {
            title: self.title.clone(),
            content: self.content.clone(),
            notes: self.notes.clone(),
            image_prompt: self.image_prompt.clone(),
        }
    }
}

/// The user-editable fields of a slide, as sent to the edit endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideEdit {
    pub title: String,
    pub content: String,
    pub notes: String,
    pub image_prompt: String,
}

/// The full lesson held by the client for the lifetime of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonContent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub overview: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub learning_objectives: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub grade_level: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub materials: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub introduction: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub main_activities: Vec<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub assessment: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conclusion: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub accessibility_features: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slides: Vec<Slide>,
    /// The server's own stage marker; the client tracks its stage separately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udl_stage: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub udl_applied_principles: Vec<UdlPrinciple>,
}

impl LessonContent {
    pub fn has_applied(&self, principle: UdlPrinciple) -> bool {
        self.udl_applied_principles.contains(&principle)
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}

//=========================================================================================
// Service Results
//=========================================================================================

/// The outcome of submitting the lesson form.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedLesson {
    pub session_id: SessionId,
    pub lesson_content: LessonContent,
}

/// The server's current view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    /// Stage name as reported by the server; may be outside the client's stage set.
    pub stage: String,
    pub lesson_content: LessonContent,
    pub available_next_stages: Vec<String>,
}

/// Summary the server attaches to an export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonDetails {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub slide_count: usize,
    #[serde(default)]
    pub edits_made: usize,
}

/// Where to fetch the exported deck from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedLesson {
    /// Origin-relative path of the artifact, e.g. `/static/downloads/<id>/deck.pptx`.
    pub download_url: String,
    pub lesson_details: Option<LessonDetails>,
}

/// Liveness payload of the generation service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub active_sessions: Option<u64>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}
