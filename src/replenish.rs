//! Replenishment of the open-ended question stream.
//!
//! The open-ended exam is an "infinite" stream: when the learner gets within
//! `threshold` questions of the end, one request for another batch is issued.
//! The protocol is split in three steps so the caller can release its lock on
//! the session while the network call runs:
//!
//! 1. [`ReplenishmentController::poll`] under the lock: decides whether to fire
//!    and hands out a ticket (single-flight: at most one ticket per session).
//! 2. [`ReplenishmentController::fetch`] without the lock: generates and parses.
//! 3. [`ReplenishmentController::complete`] under the lock again: appends, or
//!    drops the result when the session it was meant for is gone (stale).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::StudyConfig;
use crate::domain::{OpenQuestion, StudyMaterial};
use crate::error::GenerationError;
use crate::gemini::GenerationClient;
use crate::parser::parse_open_questions;
use crate::session::Session;
use crate::util::fill_template;

/// Per-session trigger state: whether a request is outstanding.
///
/// The flag is shared with the ticket handed out by `poll`. Dropping the
/// ticket releases it, so a request whose future is cancelled before
/// `complete` runs (client disconnect, aborted task) cannot wedge the stream.
#[derive(Clone, Debug, Default)]
pub struct ReplenishGate {
  in_flight: Arc<AtomicBool>,
}

impl ReplenishGate {
  pub fn in_flight(&self) -> bool {
    self.in_flight.load(Ordering::Acquire)
  }
}

/// Proof that a request was started for one specific session epoch.
/// Holds the session's in-flight flag until dropped.
#[derive(Debug)]
pub struct ReplenishTicket {
  session_id: String,
  epoch: u64,
  /// Most recent question texts, so the prompt can ask for different ones.
  previous: Vec<String>,
  in_flight: Arc<AtomicBool>,
  settled: bool,
}

impl ReplenishTicket {
  pub fn session_id(&self) -> &str {
    &self.session_id
  }
}

impl Drop for ReplenishTicket {
  fn drop(&mut self) {
    self.in_flight.store(false, Ordering::Release);
    if !self.settled {
      warn!(target: "session", session_id = %self.session_id, "Replenishment abandoned before completion; trigger released");
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplenishOutcome {
  Appended(usize),
  /// The target session was replaced or reset; the result was discarded.
  Stale,
}

#[derive(Clone, Debug)]
pub struct ReplenishmentController {
  threshold: usize,
  batch_size: usize,
  previous_limit: usize,
  template: String,
}

impl ReplenishmentController {
  pub fn new(threshold: usize, batch_size: usize, previous_limit: usize, template: impl Into<String>) -> Self {
    Self { threshold, batch_size, previous_limit, template: template.into() }
  }

  pub fn from_config(cfg: &StudyConfig) -> Self {
    Self::new(
      cfg.session.replenish_threshold,
      cfg.session.replenish_batch,
      cfg.session.previous_questions_in_prompt,
      cfg.prompts.replenish_template.clone(),
    )
  }

  pub fn threshold(&self) -> usize {
    self.threshold
  }

  /// Decide whether to start a request. Call after state-changing navigation
  /// only; views never poll.
  pub fn poll(&self, session: &mut Session<OpenQuestion>) -> Option<ReplenishTicket> {
    let remaining = session.remaining_count();
    if remaining > self.threshold {
      return None;
    }
    if session.gate.in_flight.swap(true, Ordering::AcqRel) {
      debug!(target: "session", session_id = %session.id(), remaining, "Replenishment already in flight; trigger suppressed");
      return None;
    }

    let previous = session
      .items()
      .iter()
      .rev()
      .take(self.previous_limit)
      .rev()
      .map(|q| q.text.clone())
      .collect();
    info!(target: "session", session_id = %session.id(), remaining, pool = session.len(), "Replenishment triggered");
    Some(ReplenishTicket {
      session_id: session.id().to_string(),
      epoch: session.epoch(),
      previous,
      in_flight: session.gate.in_flight.clone(),
      settled: false,
    })
  }

  /// Prompt asking for `batch_size` more questions, different from `previous`.
  pub fn prompt(&self, material: &StudyMaterial, ticket: &ReplenishTicket) -> String {
    let previous = if ticket.previous.is_empty() {
      "(none)".to_string()
    } else {
      ticket.previous.iter().map(|q| format!("- {q}")).collect::<Vec<_>>().join("\n")
    };
    fill_template(
      &self.template,
      &[
        ("count", self.batch_size.to_string().as_str()),
        ("previous", previous.as_str()),
        ("content", material.combined.as_str()),
      ],
    )
  }

  /// Generate and parse one batch. Does not touch any session.
  #[instrument(level = "info", skip_all, fields(session_id = %ticket.session_id, batch = self.batch_size))]
  pub async fn fetch(
    &self,
    client: &dyn GenerationClient,
    material: &StudyMaterial,
    ticket: &ReplenishTicket,
  ) -> Result<Vec<OpenQuestion>, GenerationError> {
    let prompt = self.prompt(material, ticket);
    let raw = client.generate(&prompt, &material.files).await?;
    Ok(parse_open_questions(&raw))
  }

  /// Apply a fetched batch. `session` is whatever open-ended session the
  /// caller currently holds (if any); results for any other session are
  /// ignored. On error the pool is left unchanged and the error is returned.
  pub fn complete(
    &self,
    session: Option<&mut Session<OpenQuestion>>,
    mut ticket: ReplenishTicket,
    result: Result<Vec<OpenQuestion>, GenerationError>,
  ) -> Result<ReplenishOutcome, GenerationError> {
    // Dropping the ticket on return releases the trigger.
    ticket.settled = true;
    let session = match session {
      Some(s) if s.id() == ticket.session_id && s.epoch() == ticket.epoch => s,
      _ => {
        warn!(target: "session", session_id = %ticket.session_id, "Discarding replenishment result for a session that is no longer active");
        return Ok(ReplenishOutcome::Stale);
      }
    };

    match result {
      Ok(questions) => {
        let added = session.append(questions);
        info!(target: "session", session_id = %session.id(), added, pool = session.len(), "Replenishment appended");
        Ok(ReplenishOutcome::Appended(added))
      }
      Err(e) => {
        warn!(target: "session", session_id = %session.id(), error = %e, "Replenishment failed; pool unchanged");
        Err(e)
      }
    }
  }
}
