//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Every client message maps to one operation on a workspace. Operations that
//! call the generation API never hold the workspace lock across the request:
//! they capture what they need, release the lock, generate, then re-lock and
//! check that the state they started from is still current before applying.

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{FileRef, ModeKind, OptionLetter, StudyMaterial};
use crate::error::{ActionError, ValidationError};
use crate::grading::{self, classify};
use crate::parser::{parse_exam, parse_flashcards};
use crate::protocol::{ClientMessage, ServerMessage, StudyMode};
use crate::replenish::{ReplenishTicket, ReplenishmentController};
use crate::session::{Session, StudyItem};
use crate::state::AppState;
use crate::util::fill_template;
use crate::workspace::{ActiveMode, ExamState, ExamTrack, Workspace, WorkspaceView};

/// A replenishment request to run once the lock is released.
type Pending = Option<(ReplenishTicket, StudyMaterial)>;

#[derive(Clone, Copy, Debug)]
enum Step {
  Next,
  Skip,
}

/// Run one client message and always produce a reply (errors become `error`).
pub async fn handle_message(state: &AppState, ws: &Mutex<Workspace>, msg: ClientMessage) -> ServerMessage {
  let action = msg.name();
  match dispatch(state, ws, msg).await {
    Ok(reply) => reply,
    Err(e) => {
      if e.is_client_error() {
        debug!(target: "session", %action, error = %e, "Action rejected");
      } else {
        error!(target: "session", %action, error = %e, "Action failed");
      }
      ServerMessage::Error { message: e.to_string() }
    }
  }
}

#[instrument(level = "info", skip(state, ws, msg), fields(action = msg.name()))]
pub async fn dispatch(state: &AppState, ws: &Mutex<Workspace>, msg: ClientMessage) -> Result<ServerMessage, ActionError> {
  match msg {
    ClientMessage::Ping => Ok(ServerMessage::Pong),
    ClientMessage::View => Ok(workspace_reply(ws.lock().await.view(), None)),
    ClientMessage::SetMaterial { text, files } => set_material(ws, &text, files).await,
    ClientMessage::EnterMode { mode } => enter_mode(state, ws, mode).await,
    ClientMessage::StartExamTrack { track } => {
      navigate(state, ws, |w, ctl| start_exam_track(w, ctl, track)).await
    }
    ClientMessage::SubmitOpenAnswer { answer } => submit_open_answer(state, ws, &answer).await,
    ClientMessage::NextQuestion => navigate(state, ws, |w, ctl| exam_step(w, ctl, Step::Next)).await,
    ClientMessage::SkipQuestion => navigate(state, ws, |w, ctl| exam_step(w, ctl, Step::Skip)).await,
    ClientMessage::PreviousQuestion => {
      update(ws, |w| match w.mcq_track_mut()?.rewind() {
        true => Ok(()),
        false => Err(ValidationError::EmptyPool),
      })
      .await
    }
    ClientMessage::SelectOption { letter } => {
      let choice = letter.parse::<OptionLetter>().map_err(|_| ValidationError::UnknownOption(letter.clone()))?;
      update(ws, |w| {
        // Ignored once the item is answered.
        w.mcq_track_mut()?.select_option(choice);
        Ok(())
      })
      .await
    }
    ClientMessage::SubmitMcq => submit_mcq(ws).await,
    ClientMessage::RetakeMcq => {
      update(ws, |w| {
        w.mcq_track_mut()?.reset();
        Ok(())
      })
      .await
    }
    ClientMessage::FlipCard => {
      update(ws, |w| {
        w.flashcards_mut()?.toggle_flip();
        Ok(())
      })
      .await
    }
    ClientMessage::NextCard => {
      update(ws, |w| {
        w.flashcards_mut()?.advance();
        Ok(())
      })
      .await
    }
    ClientMessage::PreviousCard => {
      update(ws, |w| match w.flashcards_mut()?.rewind() {
        true => Ok(()),
        false => Err(ValidationError::EmptyPool),
      })
      .await
    }
    ClientMessage::BackToModes => {
      update(ws, |w| {
        w.back_to_modes();
        Ok(())
      })
      .await
    }
  }
}

fn workspace_reply(view: WorkspaceView, warning: Option<String>) -> ServerMessage {
  ServerMessage::Workspace { view, warning }
}

/// Apply a purely local change and render.
async fn update<F>(ws: &Mutex<Workspace>, f: F) -> Result<ServerMessage, ActionError>
where
  F: FnOnce(&mut Workspace) -> Result<(), ValidationError>,
{
  let mut guard = ws.lock().await;
  f(&mut *guard)?;
  Ok(workspace_reply(guard.view(), None))
}

/// Apply a navigation change, run any replenishment it triggered, then render.
/// The append lands before the render, so the view reflects the grown pool.
async fn navigate<F>(state: &AppState, ws: &Mutex<Workspace>, f: F) -> Result<ServerMessage, ActionError>
where
  F: FnOnce(&mut Workspace, &ReplenishmentController) -> Result<Pending, ValidationError>,
{
  let pending = {
    let mut guard = ws.lock().await;
    f(&mut *guard, &state.replenisher)?
  };
  let warning = match pending {
    Some((ticket, material)) => replenish(state, ws, ticket, &material).await,
    None => None,
  };
  let guard = ws.lock().await;
  Ok(workspace_reply(guard.view(), warning))
}

/// Fetch a batch without the lock and hand it back to the controller.
/// A failure leaves the pool as it was and becomes a warning on the reply.
async fn replenish(state: &AppState, ws: &Mutex<Workspace>, ticket: ReplenishTicket, material: &StudyMaterial) -> Option<String> {
  debug!(target: "session", session_id = %ticket.session_id(), "Fetching more open-ended questions");
  let result = match state.generator() {
    Ok(client) => state.replenisher.fetch(client, material, &ticket).await,
    Err(e) => Err(e),
  };
  let mut guard = ws.lock().await;
  match state.replenisher.complete(guard.open_session_mut(), ticket, result) {
    Ok(_) => None,
    Err(e) => Some(format!("Error generating more questions: {e}")),
  }
}

fn with_material(ws: &Workspace, ticket: Option<ReplenishTicket>) -> Result<Pending, ValidationError> {
  match ticket {
    Some(t) => Ok(Some((t, ws.material()?.clone()))),
    None => Ok(None),
  }
}

fn start_exam_track(ws: &mut Workspace, ctl: &ReplenishmentController, track: ExamTrack) -> Result<Pending, ValidationError> {
  let exam = ws.exam_mut()?;
  exam.track = Some(track);
  let ticket = match track {
    ExamTrack::Mcq => {
      exam.mcq.reset();
      None
    }
    // The open-ended stream continues where it was left.
    ExamTrack::OpenEnded => ctl.poll(&mut exam.open),
  };
  info!(target: "session", ?track, "Exam track started");
  with_material(ws, ticket)
}

fn exam_step(ws: &mut Workspace, ctl: &ReplenishmentController, step: Step) -> Result<Pending, ValidationError> {
  let exam = ws.exam_mut()?;
  let ticket = match exam.track {
    Some(ExamTrack::Mcq) => {
      // The final score stays on screen until the learner retakes.
      if exam.mcq.is_finished() {
        return Err(ValidationError::Finished);
      }
      step_session(&mut exam.mcq, step)?;
      None
    }
    Some(ExamTrack::OpenEnded) => {
      step_session(&mut exam.open, step)?;
      ctl.poll(&mut exam.open)
    }
    None => return Err(ValidationError::NoActiveSession),
  };
  with_material(ws, ticket)
}

/// `Next` moves on from an answered item; `Skip` counts an attempt and moves on.
fn step_session<T: StudyItem>(session: &mut Session<T>, step: Step) -> Result<(), ValidationError> {
  match step {
    Step::Next if !session.is_answered() => return Err(ValidationError::Unanswered),
    Step::Next => session.advance(),
    Step::Skip => grading::skip(session),
  }
  debug!(target: "session", session_id = %session.id(), mode = %session.kind(), ?step, cursor = session.cursor(), attempted = session.attempted(), "Exam step");
  Ok(())
}

#[instrument(level = "info", skip(ws, text, files), fields(text_len = text.len(), files = files.len()))]
async fn set_material(ws: &Mutex<Workspace>, text: &str, files: Vec<FileRef>) -> Result<ServerMessage, ActionError> {
  let material = StudyMaterial::new(text, files).ok_or(ValidationError::MissingMaterial)?;
  info!(target: "session", files = material.files.len(), combined_len = material.combined.len(), "Study material set");
  let mut guard = ws.lock().await;
  guard.set_material(material);
  Ok(workspace_reply(guard.view(), None))
}

/// Generate the content for a mode and switch to it. An empty parse is an
/// error and leaves the previous mode in place.
#[instrument(level = "info", skip(state, ws))]
pub async fn enter_mode(state: &AppState, ws: &Mutex<Workspace>, mode: StudyMode) -> Result<ServerMessage, ActionError> {
  let (material, revision) = {
    let guard = ws.lock().await;
    (guard.material()?.clone(), guard.revision())
  };
  let client = state.generator()?;
  let prompts = &state.config.prompts;
  let counts = &state.config.session;

  let next_mode = match mode {
    StudyMode::Study => {
      let prompt = fill_template(&prompts.study_guide_template, &[("content", material.combined.as_str())]);
      let markdown = client.generate(&prompt, &material.files).await?;
      ActiveMode::StudyGuide { markdown: markdown.trim().to_string() }
    }
    StudyMode::Exam => {
      let prompt = fill_template(
        &prompts.exam_template,
        &[
          ("open_count", counts.open_question_count.to_string().as_str()),
          ("mcq_count", counts.mcq_count.to_string().as_str()),
          ("content", material.combined.as_str()),
        ],
      );
      let batch = parse_exam(&client.generate(&prompt, &material.files).await?);
      if batch.open.is_empty() && batch.mcq.is_empty() {
        return Err(ActionError::NothingGenerated(ModeKind::OpenEnded));
      }
      info!(target: "session", open = batch.open.len(), mcq = batch.mcq.len(), "Exam pools generated");
      ActiveMode::Exam(ExamState { open: Session::new(batch.open), mcq: Session::new(batch.mcq), track: None })
    }
    StudyMode::Flashcard => {
      let prompt = fill_template(
        &prompts.flashcard_template,
        &[("count", counts.flashcard_count.to_string().as_str()), ("content", material.combined.as_str())],
      );
      let cards = parse_flashcards(&client.generate(&prompt, &material.files).await?);
      if cards.is_empty() {
        return Err(ActionError::NothingGenerated(ModeKind::Flashcard));
      }
      info!(target: "session", cards = cards.len(), "Flashcard deck generated");
      ActiveMode::Flashcards(Session::new(cards))
    }
  };

  let mut guard = ws.lock().await;
  if guard.revision() != revision {
    warn!(target: "session", ?mode, "Workspace changed while generating; result discarded");
    return Ok(workspace_reply(guard.view(), Some("Generated content discarded: the workspace changed in the meantime".into())));
  }
  guard.set_mode(next_mode);
  Ok(workspace_reply(guard.view(), None))
}

/// Evaluate an open-ended answer against the material and record the verdict.
#[instrument(level = "info", skip(state, ws, answer), fields(answer_len = answer.len()))]
pub async fn submit_open_answer(state: &AppState, ws: &Mutex<Workspace>, answer: &str) -> Result<ServerMessage, ActionError> {
  let answer = answer.trim();
  if answer.is_empty() {
    return Err(ValidationError::MissingAnswer.into());
  }

  let (question, session_id, epoch, cursor, material) = {
    let mut guard = ws.lock().await;
    let session = guard.open_track_mut()?;
    if session.is_answered() {
      return Err(ValidationError::AlreadyAnswered.into());
    }
    let question = session.current().ok_or(ValidationError::EmptyPool)?.text.clone();
    let key = (session.id().to_string(), session.epoch(), session.cursor());
    (question, key.0, key.1, key.2, guard.material()?.clone())
  };

  let client = state.generator()?;
  let prompt = fill_template(
    &state.config.prompts.evaluation_template,
    &[("question", question.as_str()), ("answer", answer), ("content", material.combined.as_str())],
  );
  // Evaluation sends no file references.
  let feedback = client.generate(&prompt, &[]).await?;
  let verdict = classify(&feedback);

  let mut guard = ws.lock().await;
  let still_current = guard
    .open_track_mut()
    .map(|s| s.id() == session_id && s.epoch() == epoch && s.cursor() == cursor)
    .unwrap_or(false);
  if !still_current {
    warn!(target: "session", %session_id, "Question changed while evaluating; verdict discarded");
    return Ok(workspace_reply(guard.view(), Some("Evaluation discarded: the question changed in the meantime".into())));
  }
  grading::record_open_verdict(guard.open_track_mut()?, verdict)?;
  info!(target: "session", %session_id, ?verdict, "Open-ended answer evaluated");

  Ok(ServerMessage::OpenAnswerResult { verdict, correct: verdict.is_pass(), feedback: feedback.trim().to_string(), view: guard.view() })
}

async fn submit_mcq(ws: &Mutex<Workspace>) -> Result<ServerMessage, ActionError> {
  let mut guard = ws.lock().await;
  let outcome = grading::submit_mcq(guard.mcq_track_mut()?)?;
  Ok(ServerMessage::McqResult { outcome, view: guard.view() })
}
