//! One learner's workspace: the ingested study material and whichever mode is
//! active. Changing mode drops the previous mode's sessions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{FlashCard, McqItem, ModeKind, OpenQuestion, StudyMaterial};
use crate::error::ValidationError;
use crate::session::{Session, SessionView};

/// Which exam track the learner is working through.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExamTrack {
  OpenEnded,
  Mcq,
}

/// Both exam pools are generated together; the learner picks a track.
#[derive(Debug)]
pub struct ExamState {
  pub open: Session<OpenQuestion>,
  pub mcq: Session<McqItem>,
  pub track: Option<ExamTrack>,
}

#[derive(Debug, Default)]
pub enum ActiveMode {
  #[default]
  Idle,
  StudyGuide { markdown: String },
  Exam(ExamState),
  Flashcards(Session<FlashCard>),
}

impl ActiveMode {
  fn kind(&self) -> Option<ModeKind> {
    match self {
      ActiveMode::Exam(exam) => Some(match exam.track {
        Some(ExamTrack::Mcq) => ModeKind::Mcq,
        _ => ModeKind::OpenEnded,
      }),
      ActiveMode::Flashcards(_) => Some(ModeKind::Flashcard),
      _ => None,
    }
  }
}

#[derive(Debug)]
pub struct Workspace {
  id: String,
  material: Option<StudyMaterial>,
  mode: ActiveMode,
  /// Bumped whenever material or mode changes; generation started under an
  /// older revision is discarded.
  revision: u64,
}

/// What the client renders for the workspace.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
  pub workspace_id: String,
  pub has_material: bool,
  #[serde(flatten)]
  pub mode: ModeView,
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeView {
  Idle,
  StudyGuide {
    markdown: String,
  },
  Exam {
    track: Option<ExamTrack>,
    open: SessionView<OpenQuestion>,
    mcq: SessionView<McqItem>,
  },
  Flashcards {
    deck: SessionView<FlashCard>,
  },
}

impl Default for Workspace {
  fn default() -> Self {
    Self::new()
  }
}

impl Workspace {
  pub fn new() -> Self {
    Self { id: Uuid::new_v4().to_string(), material: None, mode: ActiveMode::Idle, revision: 0 }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn revision(&self) -> u64 {
    self.revision
  }

  pub fn mode(&self) -> &ActiveMode {
    &self.mode
  }

  pub fn set_mode(&mut self, mode: ActiveMode) {
    self.mode = mode;
    self.revision += 1;
  }

  pub fn material(&self) -> Result<&StudyMaterial, ValidationError> {
    self.material.as_ref().ok_or(ValidationError::MissingMaterial)
  }

  /// New material invalidates anything generated from the old one.
  pub fn set_material(&mut self, material: StudyMaterial) {
    self.material = Some(material);
    self.set_mode(ActiveMode::Idle);
  }

  pub fn back_to_modes(&mut self) {
    self.set_mode(ActiveMode::Idle);
  }

  pub fn exam_mut(&mut self) -> Result<&mut ExamState, ValidationError> {
    match &mut self.mode {
      ActiveMode::Exam(exam) => Ok(exam),
      other => Err(wrong_mode(ModeKind::OpenEnded, other)),
    }
  }

  /// The open-ended session, whether or not its track is the one in front.
  /// Replenishment results are applied through this.
  pub fn open_session_mut(&mut self) -> Option<&mut Session<OpenQuestion>> {
    match &mut self.mode {
      ActiveMode::Exam(exam) => Some(&mut exam.open),
      _ => None,
    }
  }

  /// The open-ended session, only while that track is active.
  pub fn open_track_mut(&mut self) -> Result<&mut Session<OpenQuestion>, ValidationError> {
    match &mut self.mode {
      ActiveMode::Exam(ExamState { open, track: Some(ExamTrack::OpenEnded), .. }) => Ok(open),
      other => Err(wrong_mode(ModeKind::OpenEnded, other)),
    }
  }

  pub fn mcq_track_mut(&mut self) -> Result<&mut Session<McqItem>, ValidationError> {
    match &mut self.mode {
      ActiveMode::Exam(ExamState { mcq, track: Some(ExamTrack::Mcq), .. }) => Ok(mcq),
      other => Err(wrong_mode(ModeKind::Mcq, other)),
    }
  }

  pub fn flashcards_mut(&mut self) -> Result<&mut Session<FlashCard>, ValidationError> {
    match &mut self.mode {
      ActiveMode::Flashcards(deck) => Ok(deck),
      other => Err(wrong_mode(ModeKind::Flashcard, other)),
    }
  }

  pub fn view(&self) -> WorkspaceView {
    let mode = match &self.mode {
      ActiveMode::Idle => ModeView::Idle,
      ActiveMode::StudyGuide { markdown } => ModeView::StudyGuide { markdown: markdown.clone() },
      ActiveMode::Exam(exam) => ModeView::Exam { track: exam.track, open: exam.open.view(), mcq: exam.mcq.view() },
      ActiveMode::Flashcards(deck) => ModeView::Flashcards { deck: deck.view() },
    };
    WorkspaceView { workspace_id: self.id.clone(), has_material: self.material.is_some(), mode }
  }
}

fn wrong_mode(expected: ModeKind, mode: &ActiveMode) -> ValidationError {
  match mode.kind() {
    Some(actual) => ValidationError::WrongMode { expected, actual },
    None => ValidationError::NoActiveSession,
  }
}
