//! Error taxonomy: generation failures (network/API), validation failures
//! (user omitted required input), and the action-level wrapper returned by
//! mode operations. An empty parse is not an error at the parser level; the
//! logic layer reports it as `ActionError::NothingGenerated`.

use thiserror::Error;

use crate::domain::ModeKind;

/// Failures talking to the hosted generation API.
#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("generation is not configured (set GEMINI_API_KEY)")]
  NotConfigured,
  #[error("invalid or missing API key")]
  InvalidApiKey,
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("API request failed with status {status}: {message}")]
  Status { status: u16, message: String },
  #[error("model '{model}' not found")]
  ModelNotFound { model: String },
  #[error("malformed response payload: {0}")]
  MalformedPayload(String),
  #[error("model returned no text")]
  EmptyResponse,
}

/// The user has to fix their input; nothing was mutated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("Please upload files or enter text")]
  MissingMaterial,
  #[error("Please provide an answer")]
  MissingAnswer,
  #[error("Please select an answer")]
  NoOptionSelected,
  #[error("This question has already been answered")]
  AlreadyAnswered,
  #[error("Answer or skip this question first")]
  Unanswered,
  #[error("All questions have been answered; retake to start over")]
  Finished,
  #[error("No active session for this action")]
  NoActiveSession,
  #[error("Action requires {expected} mode, but {actual} is active")]
  WrongMode { expected: ModeKind, actual: ModeKind },
  #[error("There is no current item")]
  EmptyPool,
  #[error("Unknown option letter: {0}")]
  UnknownOption(String),
}

/// Errors returned by mode operations.
#[derive(Debug, Error)]
pub enum ActionError {
  #[error(transparent)]
  Generation(#[from] GenerationError),
  #[error(transparent)]
  Validation(#[from] ValidationError),
  #[error("No {0} items could be generated from the material")]
  NothingGenerated(ModeKind),
}

impl ActionError {
  /// True when the fault lies with the client's request rather than upstream.
  pub fn is_client_error(&self) -> bool {
    matches!(self, ActionError::Validation(_))
  }
}
