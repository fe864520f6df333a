//! An in-memory lesson service for driving the workflow in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use lesson_pipeline_core::domain::{
    ExportedLesson, GeneratedLesson, HealthStatus, LessonContent, LessonDetails, LessonRequest,
    SessionId, SessionSnapshot, Slide, SlideEdit, Stage, UdlPrinciple,
};
use lesson_pipeline_core::ports::{LessonApi, PortError, PortResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

pub fn valid_request() -> LessonRequest {
    LessonRequest {
        topic: "Earth Science".to_string(),
        chapter: "Unit 3".to_string(),
        lesson_title: "Volcanoes".to_string(),
        grade_level: "Grade 6".to_string(),
        learning_objectives: "Explain eruptions\nIdentify volcano types".to_string(),
        duration: "45 minutes".to_string(),
        ..Default::default()
    }
}

pub fn server_error(status: u16, message: &str) -> PortError {
    PortError::Server {
        status: Some(status),
        message: message.to_string(),
    }
}

pub struct StubLessonApi {
    slide_count: usize,
    record_principles: bool,
    calls: Mutex<Vec<&'static str>>,
    sessions: Mutex<HashMap<String, LessonContent>>,
    failures: Mutex<HashMap<&'static str, PortError>>,
    slide_delays: Mutex<HashMap<usize, Duration>>,
    health_delays: Mutex<VecDeque<Duration>>,
    health_checks: AtomicU64,
    reported_stage: Mutex<Option<&'static str>>,
}

impl StubLessonApi {
    pub fn new(slide_count: usize) -> Self {
        Self {
            slide_count,
            record_principles: true,
            calls: Mutex::new(Vec::new()),
            sessions: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            slide_delays: Mutex::new(HashMap::new()),
            health_delays: Mutex::new(VecDeque::new()),
            health_checks: AtomicU64::new(0),
            reported_stage: Mutex::new(None),
        }
    }

    /// A service that answers principle requests without recording them.
    pub fn forgetting_principles(slide_count: usize) -> Self {
        Self {
            record_principles: false,
            ..Self::new(slide_count)
        }
    }

    /// Makes every later call to `operation` fail with `error`.
    pub fn fail(&self, operation: &'static str, error: PortError) {
        self.failures.lock().unwrap().insert(operation, error);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failures.lock().unwrap().remove(operation);
    }

    /// Makes session snapshots name `stage` whatever the lesson holds.
    pub fn report_stage(&self, stage: &'static str) {
        *self.reported_stage.lock().unwrap() = Some(stage);
    }

    pub fn delay_slide(&self, slide_index: usize, delay: Duration) {
        self.slide_delays.lock().unwrap().insert(slide_index, delay);
    }

    /// Delays applied to successive health checks, in call order.
    pub fn queue_health_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        self.health_delays.lock().unwrap().extend(delays);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|call| **call == operation).count()
    }

    pub fn has_session(&self, session_id: &SessionId) -> bool {
        self.sessions.lock().unwrap().contains_key(session_id.as_str())
    }

    fn enter(&self, operation: &'static str) -> PortResult<()> {
        self.calls.lock().unwrap().push(operation);
        match self.failures.lock().unwrap().get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn with_lesson<T>(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(&mut LessonContent) -> PortResult<T>,
    ) -> PortResult<T> {
        let mut sessions = self.sessions.lock().unwrap();
        let lesson = sessions
            .get_mut(session_id.as_str())
            .ok_or_else(|| server_error(404, "Lesson session not found"))?;
        f(lesson)
    }

    fn update_slide(
        &self,
        session_id: &SessionId,
        slide_index: usize,
        f: impl FnOnce(&mut Slide),
    ) -> PortResult<Slide> {
        self.with_lesson(session_id, |lesson| {
            let slide = lesson
                .slides
                .get_mut(slide_index)
                .ok_or_else(|| server_error(400, "Invalid slide index"))?;
            f(slide);
            Ok(slide.clone())
        })
    }

    async fn slide_delay(&self, slide_index: usize) {
        let delay = self.slide_delays.lock().unwrap().get(&slide_index).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn stage_name(lesson: &LessonContent) -> &'static str {
    match lesson.udl_applied_principles.last() {
        Some(UdlPrinciple::Engagement) => Stage::Engagement.as_str(),
        Some(UdlPrinciple::Representation) => Stage::Representation.as_str(),
        Some(UdlPrinciple::ActionExpression) => Stage::ActionExpression.as_str(),
        None => Stage::Baseline.as_str(),
    }
}

#[async_trait]
impl LessonApi for StubLessonApi {
    async fn generate_baseline(&self, request: &LessonRequest) -> PortResult<GeneratedLesson> {
        self.enter("generate_baseline")?;
        let session_id = SessionId::new(Uuid::new_v4().to_string())?;
        let lesson = LessonContent {
            title: request.lesson_title.clone(),
            grade_level: request.grade_level.clone(),
            duration: request.duration.clone(),
            learning_objectives: request
                .learning_objective_items()
                .into_iter()
                .map(str::to_string)
                .collect(),
            slides: (1..=self.slide_count)
                .map(|n| Slide {
                    title: format!("Slide {n}"),
                    content: format!("Content {n}"),
                    ..Default::default()
                })
                .collect(),
            udl_stage: Some(Stage::Baseline.as_str().to_string()),
            ..Default::default()
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.as_str().to_string(), lesson.clone());
        Ok(GeneratedLesson {
            session_id,
            lesson_content: lesson,
        })
    }

    async fn get_session(&self, session_id: &SessionId) -> PortResult<SessionSnapshot> {
        self.enter("get_session")?;
        let reported = *self.reported_stage.lock().unwrap();
        self.with_lesson(session_id, |lesson| {
            Ok(SessionSnapshot {
                session_id: session_id.clone(),
                stage: reported.unwrap_or_else(|| stage_name(lesson)).to_string(),
                lesson_content: lesson.clone(),
                available_next_stages: Vec::new(),
            })
        })
    }

    async fn edit_slide(
        &self,
        session_id: &SessionId,
        slide_index: usize,
        edit: &SlideEdit,
    ) -> PortResult<Slide> {
        self.enter("edit_slide")?;
        self.slide_delay(slide_index).await;
        self.update_slide(session_id, slide_index, |slide| {
            slide.title = edit.title.clone();
            slide.content = edit.content.clone();
            slide.notes = edit.notes.clone();
            slide.image_prompt = edit.image_prompt.clone();
        })
    }

    async fn ai_enhance_slide(
        &self,
        session_id: &SessionId,
        slide_index: usize,
        prompt: &str,
    ) -> PortResult<Slide> {
        self.enter("ai_enhance_slide")?;
        self.slide_delay(slide_index).await;
        self.update_slide(session_id, slide_index, |slide| {
            slide.content = format!("{} ({})", slide.content, prompt);
        })
    }

    async fn apply_udl_principle(
        &self,
        session_id: &SessionId,
        principle: UdlPrinciple,
        custom_requirements: Option<&str>,
    ) -> PortResult<LessonContent> {
        self.enter("apply_udl_principle")?;
        let record = self.record_principles;
        self.with_lesson(session_id, |lesson| {
            if record {
                lesson.udl_applied_principles.push(principle);
            }
            lesson.udl_stage = Some(principle.as_str().to_string());
            for slide in &mut lesson.slides {
                let mut notes = principle.guidelines().map(str::to_string).to_vec();
                if let Some(extra) = custom_requirements {
                    notes.push(extra.to_string());
                }
                slide
                    .udl_enhancements
                    .insert(principle.as_str().to_string(), notes);
            }
            Ok(lesson.clone())
        })
    }

    async fn export_lesson(&self, session_id: &SessionId) -> PortResult<ExportedLesson> {
        self.enter("export_lesson")?;
        self.with_lesson(session_id, |lesson| {
            Ok(ExportedLesson {
                download_url: format!("/static/downloads/{}/lesson.pptx", session_id),
                lesson_details: Some(LessonDetails {
                    title: lesson.title.clone(),
                    stage: stage_name(lesson).to_string(),
                    slide_count: lesson.slides.len(),
                    edits_made: 0,
                }),
            })
        })
    }

    async fn delete_session(&self, session_id: &SessionId) -> PortResult<()> {
        self.enter("delete_session")?;
        self.sessions.lock().unwrap().remove(session_id.as_str());
        Ok(())
    }

    async fn health_check(&self) -> PortResult<HealthStatus> {
        self.enter("health_check")?;
        let check = self.health_checks.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.health_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(HealthStatus {
            status: "healthy".to_string(),
            message: format!("check {check}"),
            version: "1.0.0".to_string(),
            active_sessions: Some(self.sessions.lock().unwrap().len() as u64),
        })
    }
}
