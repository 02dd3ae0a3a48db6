//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! The same client message drives a workspace over either transport.

use serde::{Deserialize, Serialize};

use crate::domain::FileRef;
use crate::grading::{McqOutcome, Verdict};
use crate::parser::{ExamBatch, ParsedItems};
use crate::workspace::{ExamTrack, WorkspaceView};

/// Top-level learning modes offered once material is loaded.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    Study,
    Exam,
    Flashcard,
}

/// Messages the client can send (WS frame or HTTP action body).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    SetMaterial {
        #[serde(default)]
        text: String,
        #[serde(default)]
        files: Vec<FileRef>,
    },
    EnterMode {
        mode: StudyMode,
    },
    StartExamTrack {
        track: ExamTrack,
    },
    SubmitOpenAnswer {
        answer: String,
    },
    NextQuestion,
    SkipQuestion,
    PreviousQuestion,
    SelectOption {
        letter: String,
    },
    SubmitMcq,
    RetakeMcq,
    FlipCard,
    NextCard,
    PreviousCard,
    BackToModes,
    View,
}

impl ClientMessage {
    /// Stable name for logs; never includes user text.
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Ping => "ping",
            ClientMessage::SetMaterial { .. } => "set_material",
            ClientMessage::EnterMode { .. } => "enter_mode",
            ClientMessage::StartExamTrack { .. } => "start_exam_track",
            ClientMessage::SubmitOpenAnswer { .. } => "submit_open_answer",
            ClientMessage::NextQuestion => "next_question",
            ClientMessage::SkipQuestion => "skip_question",
            ClientMessage::PreviousQuestion => "previous_question",
            ClientMessage::SelectOption { .. } => "select_option",
            ClientMessage::SubmitMcq => "submit_mcq",
            ClientMessage::RetakeMcq => "retake_mcq",
            ClientMessage::FlipCard => "flip_card",
            ClientMessage::NextCard => "next_card",
            ClientMessage::PreviousCard => "previous_card",
            ClientMessage::BackToModes => "back_to_modes",
            ClientMessage::View => "view",
        }
    }
}

/// Messages the server sends back; exactly one per client message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    Workspace {
        view: WorkspaceView,
        /// Set when the action succeeded but a background step (replenishment) failed.
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    OpenAnswerResult {
        verdict: Verdict,
        correct: bool,
        feedback: String,
        view: WorkspaceView,
    },
    McqResult {
        outcome: McqOutcome,
        view: WorkspaceView,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

/// What a raw response should be parsed as.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParseKind {
    OpenEnded,
    Mcq,
    Flashcard,
    /// Mixed open-ended + MCQ response.
    Exam,
}

#[derive(Deserialize)]
pub struct ParseIn {
    pub kind: ParseKind,
    pub text: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ParseOut {
    Items(ParsedItems),
    Exam(ExamBatch),
}

#[derive(Deserialize)]
pub struct ClassifyIn {
    pub text: String,
}
#[derive(Serialize)]
pub struct ClassifyOut {
    pub verdict: Verdict,
    pub correct: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceOut {
    pub workspace_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
    pub ok: bool,
    pub generation: bool,
}
