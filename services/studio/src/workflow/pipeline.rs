//! services/studio/src/workflow/pipeline.rs
//!
//! The workflow driver. It owns the current stage, the session id and the
//! lesson content, and is the only place that content is replaced.
//!
//! Every operation checks its preconditions before touching the network, and a
//! failed call leaves the held content exactly as it was.

use crate::workflow::autosave::{Autosave, AutosaveSnapshot};
use chrono::{DateTime, Utc};
use lesson_pipeline_core::domain::{
    ExportedLesson, LessonContent, LessonRequest, SessionId, Slide, SlideEdit, Stage,
    UdlPrinciple,
};
use lesson_pipeline_core::ports::{LessonApi, PortError, PortResult};
use lesson_pipeline_core::stages::{can_advance, next_stage, previous_stage, progress_fraction};
use lesson_pipeline_core::validation::{
    ensure_valid_request, validate_session_id, validate_slide_index,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

//=========================================================================================
// Detached Slide Requests
//=========================================================================================

/// Indices of slides with a request in flight, shared with the requests themselves.
type PendingSlides = Arc<Mutex<BTreeSet<usize>>>;

fn lock(pending: &PendingSlides) -> MutexGuard<'_, BTreeSet<usize>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks one slide busy for as long as its request or outcome is alive.
#[derive(Debug)]
struct SlideSlot {
    pending: PendingSlides,
    slide_index: usize,
}

impl Drop for SlideSlot {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.slide_index);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideAction {
    Edit(SlideEdit),
    Enhance(String),
}

/// A slide request that has passed its preconditions and can be sent without
/// holding the pipeline, so requests for different slides can run at once.
///
/// Dropping the call, or the future returned by [`SlideCall::send`], frees the
/// slide again.
pub struct SlideCall {
    api: Arc<dyn LessonApi>,
    session_id: SessionId,
    epoch: u64,
    slot: SlideSlot,
    action: SlideAction,
}

impl SlideCall {
    pub fn slide_index(&self) -> usize {
        self.slot.slide_index
    }

    pub async fn send(self) -> SlideOutcome {
        let slide_index = self.slot.slide_index;
        let result = match &self.action {
            SlideAction::Edit(edit) => {
                self.api
                    .edit_slide(&self.session_id, slide_index, edit)
                    .await
            }
            SlideAction::Enhance(prompt) => {
                self.api
                    .ai_enhance_slide(&self.session_id, slide_index, prompt)
                    .await
            }
        };
        SlideOutcome {
            epoch: self.epoch,
            slot: self.slot,
            result,
        }
    }
}

/// The server's answer to a [`SlideCall`], waiting to be applied. The slide
/// stays busy until the outcome is applied or dropped.
#[derive(Debug)]
pub struct SlideOutcome {
    epoch: u64,
    slot: SlideSlot,
    result: PortResult<Slide>,
}

impl SlideOutcome {
    pub fn slide_index(&self) -> usize {
        self.slot.slide_index
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

//=========================================================================================
// LessonPipeline
//=========================================================================================

/// How [`LessonPipeline::resume_or_restore`] picked the session up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resumed {
    /// The server session was loaded.
    Online,
    /// The service was unreachable and the local autosave was loaded instead.
    Offline { saved_at: Option<DateTime<Utc>> },
}

pub struct LessonPipeline {
    api: Arc<dyn LessonApi>,
    stage: Stage,
    session_id: Option<SessionId>,
    content: Option<LessonContent>,
    export: Option<ExportedLesson>,
    /// Bumped whenever the session is replaced; outcomes from an older epoch are dropped.
    epoch: u64,
    /// Replaced with a fresh set on every new session, so slots still held by
    /// superseded requests release into the old one.
    pending_slides: PendingSlides,
}

impl LessonPipeline {
    pub fn new(api: Arc<dyn LessonApi>) -> Self {
        Self {
            api,
            stage: Stage::Form,
            session_id: None,
            content: None,
            export: None,
            epoch: 0,
            pending_slides: PendingSlides::default(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn content(&self) -> Option<&LessonContent> {
        self.content.as_ref()
    }

    pub fn exported(&self) -> Option<&ExportedLesson> {
        self.export.as_ref()
    }

    pub fn progress(&self) -> f64 {
        progress_fraction(self.stage)
    }

    pub fn next_stage(&self) -> Option<Stage> {
        next_stage(self.stage)
    }

    pub fn previous_stage(&self) -> Option<Stage> {
        previous_stage(self.stage)
    }

    pub fn can_advance(&self) -> bool {
        can_advance(self.stage, self.content.as_ref())
    }

    pub fn is_slide_pending(&self, slide_index: usize) -> bool {
        lock(&self.pending_slides).contains(&slide_index)
    }

    fn require_session(&self) -> PortResult<SessionId> {
        validate_session_id(self.session_id.as_ref().map(SessionId::as_str))
    }

    fn require_content(&self) -> PortResult<&LessonContent> {
        self.content.as_ref().ok_or_else(|| {
            PortError::Precondition("No lesson has been generated yet".to_string())
        })
    }

    /// Installs a new session and forgets everything about the previous one.
    fn install(&mut self, session_id: SessionId, content: LessonContent, stage: Stage) {
        self.epoch += 1;
        self.pending_slides = PendingSlides::default();
        self.export = None;
        self.session_id = Some(session_id);
        self.content = Some(content);
        self.stage = stage;
    }

    //-------------------------------------------------------------------------------------
    // Form submission and session recovery
    //-------------------------------------------------------------------------------------

    /// Validates the form and generates the baseline lesson.
    pub async fn submit(&mut self, request: &LessonRequest) -> PortResult<&LessonContent> {
        if self.stage != Stage::Form {
            return Err(PortError::Precondition(
                "A lesson is already in progress. Start a new lesson first.".to_string(),
            ));
        }
        ensure_valid_request(request)?;

        let generated = self.api.generate_baseline(request).await?;
        info!(
            session_id = %generated.session_id,
            slides = generated.lesson_content.slide_count(),
            "Baseline lesson ready"
        );
        self.install(generated.session_id, generated.lesson_content, Stage::Baseline);
        self.require_content()
    }

    /// Picks up an existing server session by id.
    ///
    /// The server's stage name is only trusted as far as the lesson's applied
    /// principles support it.
    pub async fn resume(&mut self, raw_session_id: &str) -> PortResult<&LessonContent> {
        let session_id = validate_session_id(Some(raw_session_id))?;
        let snapshot = self.api.get_session(&session_id).await?;
        let reached = stage_reached(&snapshot.lesson_content);
        let stage = match Stage::from_name(&snapshot.stage) {
            Some(Stage::Form) | None => reached,
            Some(named) if named > reached => {
                warn!(server_stage = %named, %reached, "Server stage is ahead of the applied principles");
                reached
            }
            Some(named) => named,
        };
        info!(session_id = %snapshot.session_id, %stage, "Resumed lesson session");
        self.install(snapshot.session_id, snapshot.lesson_content, stage);
        self.require_content()
    }

    /// Loads a locally saved snapshot without contacting the server.
    pub fn restore_snapshot(&mut self, snapshot: AutosaveSnapshot) -> &LessonContent {
        let stage = stage_reached(&snapshot.lesson_content);
        info!(session_id = %snapshot.session_id, %stage, "Restored lesson from autosave");
        self.install(snapshot.session_id, snapshot.lesson_content, stage);
        self.content.get_or_insert_with(LessonContent::default)
    }

    /// Resumes the server session, falling back to the autosaved copy when the
    /// service cannot be reached.
    pub async fn resume_or_restore(
        &mut self,
        raw_session_id: &str,
        autosave: &Autosave,
    ) -> PortResult<Resumed> {
        let err = match self.resume(raw_session_id).await {
            Ok(_) => return Ok(Resumed::Online),
            Err(e) if e.is_network_error() => e,
            Err(e) => return Err(e),
        };
        let session_id = validate_session_id(Some(raw_session_id))?;
        let snapshot = autosave.restore(&session_id).await.ok_or(err)?;
        let saved_at = snapshot.saved_at();
        self.restore_snapshot(snapshot);
        Ok(Resumed::Offline { saved_at })
    }

    /// Re-reads the lesson held by the server for the current session.
    pub async fn refresh(&mut self) -> PortResult<&LessonContent> {
        let session_id = self.require_session()?;
        let snapshot = self.api.get_session(&session_id).await?;
        Ok(&*self.content.insert(snapshot.lesson_content))
    }

    //-------------------------------------------------------------------------------------
    // Slide editing
    //-------------------------------------------------------------------------------------

    pub fn prepare_slide_edit(&mut self, slide_index: usize, edit: SlideEdit) -> PortResult<SlideCall> {
        self.prepare_slide_call(slide_index, SlideAction::Edit(edit))
    }

    pub fn prepare_slide_enhancement(
        &mut self,
        slide_index: usize,
        prompt: impl Into<String>,
    ) -> PortResult<SlideCall> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(PortError::Validation(vec![
                "Enhancement prompt is required".to_string(),
            ]));
        }
        self.prepare_slide_call(slide_index, SlideAction::Enhance(prompt))
    }

    fn prepare_slide_call(&mut self, slide_index: usize, action: SlideAction) -> PortResult<SlideCall> {
        let session_id = self.require_session()?;
        validate_slide_index(slide_index, self.require_content()?.slide_count())?;
        if !lock(&self.pending_slides).insert(slide_index) {
            return Err(PortError::Precondition(format!(
                "Slide {} already has a request in progress",
                slide_index
            )));
        }
        Ok(SlideCall {
            api: self.api.clone(),
            session_id,
            epoch: self.epoch,
            slot: SlideSlot {
                pending: self.pending_slides.clone(),
                slide_index,
            },
            action,
        })
    }

    /// Applies a slide outcome to the held lesson.
    ///
    /// Returns `Ok(None)` when the outcome belongs to a session that has since been
    /// replaced, in which case it is ignored.
    pub fn apply_slide_outcome(&mut self, outcome: SlideOutcome) -> PortResult<Option<&Slide>> {
        let SlideOutcome { epoch, slot, result } = outcome;
        let slide_index = slot.slide_index;
        drop(slot);
        if epoch != self.epoch {
            debug!(slide_index, "Ignoring superseded slide response");
            return Ok(None);
        }
        let slide = result?;

        let Some(current) = self.content.as_ref() else {
            return Ok(None);
        };
        if slide_index >= current.slide_count() {
            warn!(slide_index, "Slide no longer exists; dropping server response");
            return Ok(None);
        }
        let mut updated = current.clone();
        updated.slides[slide_index] = slide;
        Ok(self.content.insert(updated).slides.get(slide_index))
    }

    pub async fn edit_slide(&mut self, slide_index: usize, edit: SlideEdit) -> PortResult<&Slide> {
        let call = self.prepare_slide_edit(slide_index, edit)?;
        let outcome = call.send().await;
        self.apply_slide_outcome(outcome)?
            .ok_or_else(|| PortError::Precondition("The slide could not be updated".to_string()))
    }

    pub async fn enhance_slide(
        &mut self,
        slide_index: usize,
        prompt: impl Into<String>,
    ) -> PortResult<&Slide> {
        let call = self.prepare_slide_enhancement(slide_index, prompt)?;
        let outcome = call.send().await;
        self.apply_slide_outcome(outcome)?
            .ok_or_else(|| PortError::Precondition("The slide could not be updated".to_string()))
    }

    //-------------------------------------------------------------------------------------
    // Stage transitions
    //-------------------------------------------------------------------------------------

    /// Moves to the next stage. Entering an enhancement stage applies its UDL
    /// principle on the server; entering `export` exports the lesson.
    pub async fn advance(&mut self, custom_requirements: Option<&str>) -> PortResult<Stage> {
        if self.stage == Stage::Form {
            return Err(PortError::Precondition(
                "Submit the lesson form to generate a baseline first".to_string(),
            ));
        }
        let Some(next) = next_stage(self.stage) else {
            return Err(PortError::Precondition(
                "The lesson has already been exported".to_string(),
            ));
        };
        self.ensure_can_leave_stage()?;
        if !lock(&self.pending_slides).is_empty() {
            return Err(PortError::Precondition(
                "Wait for slide requests in progress to finish".to_string(),
            ));
        }
        let session_id = self.require_session()?;

        match next.principle() {
            Some(principle) => {
                let updated = self
                    .api
                    .apply_udl_principle(&session_id, principle, custom_requirements)
                    .await?;
                if !updated.has_applied(principle) {
                    warn!(%principle, "Service did not record the principle it applied");
                }
                self.content = Some(updated);
                self.stage = next;
                info!(stage = %next, "Advanced lesson stage");
            }
            None => {
                self.run_export(&session_id).await?;
            }
        }
        Ok(self.stage)
    }

    fn ensure_can_leave_stage(&self) -> PortResult<()> {
        if self.can_advance() {
            return Ok(());
        }
        let reason = match self.stage.principle() {
            Some(principle) => format!(
                "The {} principle has not been applied yet",
                principle.display_name()
            ),
            None if self.stage == Stage::Baseline => {
                "The baseline lesson has no slides yet".to_string()
            }
            None => format!("Cannot leave the {} stage", self.stage.display_name()),
        };
        Err(PortError::Precondition(reason))
    }

    /// Exports the lesson. Allowed once all three principles are in place.
    pub async fn export(&mut self) -> PortResult<&ExportedLesson> {
        match self.stage {
            Stage::Export => {}
            Stage::ActionExpression => self.ensure_can_leave_stage()?,
            _ => {
                return Err(PortError::Precondition(
                    "Apply all three UDL principles before exporting".to_string(),
                ))
            }
        }
        let session_id = self.require_session()?;
        self.run_export(&session_id).await
    }

    async fn run_export(&mut self, session_id: &SessionId) -> PortResult<&ExportedLesson> {
        let exported = self.api.export_lesson(session_id).await?;
        self.stage = Stage::Export;
        info!(download_url = %exported.download_url, "Lesson export ready");
        Ok(&*self.export.insert(exported))
    }

    /// Abandons the current lesson and returns to the form. The server session
    /// is deleted on a best-effort basis; local state is cleared either way.
    pub async fn reset(&mut self) -> PortResult<()> {
        let session_id = self.session_id.take();
        self.epoch += 1;
        self.pending_slides = PendingSlides::default();
        self.content = None;
        self.export = None;
        self.stage = Stage::Form;

        if let Some(session_id) = session_id {
            self.api.delete_session(&session_id).await?;
        }
        Ok(())
    }
}

/// The furthest stage a lesson's applied principles account for. Principles
/// only count while every earlier one is applied too.
fn stage_reached(content: &LessonContent) -> Stage {
    UdlPrinciple::ALL
        .into_iter()
        .take_while(|principle| content.has_applied(*principle))
        .last()
        .map_or(Stage::Baseline, |principle| match principle {
            UdlPrinciple::Engagement => Stage::Engagement,
            UdlPrinciple::Representation => Stage::Representation,
            UdlPrinciple::ActionExpression => Stage::ActionExpression,
        })
}
