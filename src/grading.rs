//! Grading: exact-letter MCQ checks and classification of the model's
//! `RESULT:` verdict for open-ended answers. Both feed the session score.

use serde::Serialize;
use tracing::debug;

use crate::domain::{McqItem, OpenQuestion, OptionLetter};
use crate::error::ValidationError;
use crate::session::{Session, StudyItem};

/// Verdict parsed from an evaluation response.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  Correct,
  PartiallyCorrect,
  Incorrect,
  /// No recognizable `RESULT:` label; graded as wrong.
  Unrecognized,
}

impl Verdict {
  pub fn is_pass(self) -> bool {
    self == Verdict::Correct
  }
}

/// Classify an evaluation response.
///
/// Passes only when `RESULT: CORRECT` appears and neither `RESULT: PARTIALLY`
/// nor `RESULT: INCORRECT` does, so "PARTIALLY CORRECT" can never pass
/// through a substring match. Anything else fails rather than erroring.
pub fn classify(response: &str) -> Verdict {
  let upper = response.to_uppercase();
  let partially = upper.contains("RESULT: PARTIALLY");
  let incorrect = upper.contains("RESULT: INCORRECT");
  let correct = upper.contains("RESULT: CORRECT");

  if correct && !partially && !incorrect {
    Verdict::Correct
  } else if partially {
    Verdict::PartiallyCorrect
  } else if incorrect {
    Verdict::Incorrect
  } else {
    Verdict::Unrecognized
  }
}

/// Exact letter equality; an item without a recorded answer never matches.
pub fn grade_mcq(selected: OptionLetter, item: &McqItem) -> bool {
  item.correct_letter == Some(selected)
}

/// Result of submitting an MCQ answer.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct McqOutcome {
  pub correct: bool,
  pub selected: OptionLetter,
  pub correct_letter: Option<OptionLetter>,
  pub explanation: String,
}

/// Grade the selected option of the current MCQ and record the attempt.
/// Submitting without a selection is a validation error and counts nothing.
/// A finished pool accepts no more answers until it is reset.
pub fn submit_mcq(session: &mut Session<McqItem>) -> Result<McqOutcome, ValidationError> {
  if session.is_finished() {
    return Err(ValidationError::Finished);
  }
  if session.is_answered() {
    return Err(ValidationError::AlreadyAnswered);
  }
  let item = session.current().ok_or(ValidationError::EmptyPool)?;
  let selected = session.selected_option().ok_or(ValidationError::NoOptionSelected)?;

  let outcome = McqOutcome {
    correct: grade_mcq(selected, item),
    selected,
    correct_letter: item.correct_letter,
    explanation: item.explanation.clone(),
  };
  session.mark_answered();
  session.record_attempt(outcome.correct);
  debug!(target: "session", session_id = %session.id(), correct = outcome.correct, score = session.score(), attempted = session.attempted(), "MCQ graded");
  Ok(outcome)
}

/// Record an evaluated open-ended answer on the current question.
pub fn record_open_verdict(session: &mut Session<OpenQuestion>, verdict: Verdict) -> Result<(), ValidationError> {
  if session.is_answered() {
    return Err(ValidationError::AlreadyAnswered);
  }
  if session.current().is_none() {
    return Err(ValidationError::EmptyPool);
  }
  session.mark_answered();
  session.record_attempt(verdict.is_pass());
  debug!(target: "session", session_id = %session.id(), ?verdict, score = session.score(), attempted = session.attempted(), "Open-ended answer recorded");
  Ok(())
}

/// Skip the current item: counts as an attempt without credit, unless it was
/// already answered (and therefore already counted), then moves on.
pub fn skip<T: StudyItem>(session: &mut Session<T>) {
  if !session.is_answered() {
    session.record_attempt(false);
  }
  session.advance();
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(letter: Option<OptionLetter>) -> McqItem {
    McqItem {
      question: "Pick".into(),
      options: vec!["A) a".into(), "B) b".into(), "C) c".into(), "D) d".into()],
      correct_letter: letter,
      explanation: "because".into(),
    }
  }

  #[test]
  fn classifies_results() {
    assert_eq!(classify("RESULT: CORRECT\nWell reasoned."), Verdict::Correct);
    assert_eq!(classify("result: correct"), Verdict::Correct);
    assert_eq!(classify("RESULT: PARTIALLY CORRECT\nMissing a step."), Verdict::PartiallyCorrect);
    assert_eq!(classify("RESULT: INCORRECT\nNo."), Verdict::Incorrect);
    assert_eq!(classify("Looks fine to me"), Verdict::Unrecognized);
    assert_eq!(classify(""), Verdict::Unrecognized);
  }

  #[test]
  fn substring_collisions_fail() {
    assert!(!classify("RESULT: CORRECT but RESULT: PARTIALLY CORRECT").is_pass());
    assert!(!classify("RESULT: CORRECT\n...\nRESULT: INCORRECT").is_pass());
    assert!(classify("RESULT: CORRECT\n...").is_pass());
    assert!(!classify("RESULT: PARTIALLY CORRECT\n...").is_pass());
  }

  #[test]
  fn mcq_grading_is_letter_equality() {
    let it = item(Some(OptionLetter::B));
    assert!(grade_mcq(OptionLetter::B, &it));
    assert!(!grade_mcq(OptionLetter::A, &it));
    assert!(!grade_mcq(OptionLetter::A, &item(None)));
  }

  #[test]
  fn submit_without_selection_changes_nothing() {
    let mut s = Session::new(vec![item(Some(OptionLetter::A))]);
    assert_eq!(submit_mcq(&mut s), Err(ValidationError::NoOptionSelected));
    assert_eq!(s.attempted(), 0);
    assert!(!s.is_answered());
  }

  #[test]
  fn submit_records_once() {
    let mut s = Session::new(vec![item(Some(OptionLetter::D)), item(Some(OptionLetter::A))]);
    s.select_option(OptionLetter::D);
    let outcome = submit_mcq(&mut s).unwrap();
    assert!(outcome.correct);
    assert_eq!(outcome.explanation, "because");
    assert_eq!((s.score(), s.attempted()), (1, 1));
    assert_eq!(submit_mcq(&mut s), Err(ValidationError::AlreadyAnswered));
    assert_eq!(s.attempted(), 1);

    s.advance();
    s.select_option(OptionLetter::C);
    let outcome = submit_mcq(&mut s).unwrap();
    assert!(!outcome.correct);
    assert_eq!(outcome.correct_letter, Some(OptionLetter::A));
    assert_eq!((s.score(), s.attempted()), (1, 2));
  }

  #[test]
  fn finished_pool_stops_scoring() {
    let mut s = Session::new(vec![item(Some(OptionLetter::A))]);
    s.select_option(OptionLetter::A);
    submit_mcq(&mut s).unwrap();
    assert!(s.is_finished());

    // Reviewing wraps back to the item, but it cannot be graded again.
    s.advance();
    s.select_option(OptionLetter::A);
    assert_eq!(submit_mcq(&mut s), Err(ValidationError::Finished));
    assert_eq!((s.score(), s.attempted()), (1, 1));

    s.reset();
    s.select_option(OptionLetter::B);
    assert!(!submit_mcq(&mut s).unwrap().correct);
    assert_eq!((s.score(), s.attempted()), (0, 1));
  }

  #[test]
  fn skip_counts_attempt_without_credit() {
    let mut open = Session::new(vec![OpenQuestion { text: "q1".into() }, OpenQuestion { text: "q2".into() }]);
    skip(&mut open);
    assert_eq!((open.score(), open.attempted(), open.cursor()), (0, 1, 1));

    let mut mcqs = Session::new(vec![item(Some(OptionLetter::A)), item(Some(OptionLetter::B))]);
    skip(&mut mcqs);
    assert_eq!((mcqs.score(), mcqs.attempted(), mcqs.cursor()), (0, 1, 1));
  }

  #[test]
  fn skip_after_answering_does_not_double_count() {
    let mut open = Session::new(vec![OpenQuestion { text: "q1".into() }, OpenQuestion { text: "q2".into() }]);
    record_open_verdict(&mut open, Verdict::Correct).unwrap();
    skip(&mut open);
    assert_eq!((open.score(), open.attempted()), (1, 1));
  }

  #[test]
  fn open_verdict_needs_a_current_question() {
    let mut open: Session<OpenQuestion> = Session::new(vec![]);
    assert_eq!(record_open_verdict(&mut open, Verdict::Correct), Err(ValidationError::EmptyPool));
    assert_eq!(open.attempted(), 0);
  }
}
