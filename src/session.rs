//! Per-mode session state: the item pool, cursor, and running score.
//!
//! One generic `Session<T>` serves all three modes; `T::MODE` decides the
//! navigation rule. Open-ended sessions move forward only (the pool keeps
//! growing through replenishment), MCQ and flashcard pools are fixed and wrap.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{FlashCard, McqItem, ModeKind, OpenQuestion, OptionLetter};
use crate::replenish::ReplenishGate;

/// A record that can live in a session pool.
pub trait StudyItem: Clone + Serialize + Send + Sync + 'static {
  const MODE: ModeKind;

  /// The copy shown to the learner before/after answering.
  fn for_display(&self, _answered: bool) -> Self {
    self.clone()
  }
}

impl StudyItem for OpenQuestion {
  const MODE: ModeKind = ModeKind::OpenEnded;
}

impl StudyItem for McqItem {
  const MODE: ModeKind = ModeKind::Mcq;

  // Keep the answer hidden until the item has been graded.
  fn for_display(&self, answered: bool) -> Self {
    if answered {
      return self.clone();
    }
    McqItem { correct_letter: None, explanation: String::new(), ..self.clone() }
  }
}

impl StudyItem for FlashCard {
  const MODE: ModeKind = ModeKind::Flashcard;
}

#[derive(Clone, Debug)]
pub struct Session<T: StudyItem> {
  id: String,
  epoch: u64,
  items: Vec<T>,
  cursor: usize,
  score: u32,
  attempted: u32,
  selected_option: Option<OptionLetter>,
  answered: bool,
  flipped: bool,
  pub(crate) gate: ReplenishGate,
}

/// Render-ready snapshot of a session.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView<T> {
  pub session_id: String,
  pub mode: ModeKind,
  /// 1-based position of the current item.
  pub position: usize,
  /// Pool size; `None` for the open-ended stream, which has no fixed end.
  pub total: Option<usize>,
  pub remaining: usize,
  pub score: u32,
  pub attempted: u32,
  pub percent: u32,
  pub current: Option<T>,
  pub selected_option: Option<OptionLetter>,
  pub answered: bool,
  pub flipped: bool,
  pub finished: bool,
  pub replenishing: bool,
}

impl<T: StudyItem> Session<T> {
  pub fn new(items: Vec<T>) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      epoch: 0,
      items,
      cursor: 0,
      score: 0,
      attempted: 0,
      selected_option: None,
      answered: false,
      flipped: false,
      gate: ReplenishGate::default(),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Bumped by [`Session::reset`]; lets late results detect they are stale.
  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  pub fn kind(&self) -> ModeKind {
    T::MODE
  }

  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn score(&self) -> u32 {
    self.score
  }

  pub fn attempted(&self) -> u32 {
    self.attempted
  }

  pub fn selected_option(&self) -> Option<OptionLetter> {
    self.selected_option
  }

  pub fn is_answered(&self) -> bool {
    self.answered
  }

  pub fn is_flipped(&self) -> bool {
    self.flipped
  }

  pub fn current(&self) -> Option<&T> {
    self.items.get(self.cursor)
  }

  /// `items.len() - cursor`, never negative.
  pub fn remaining_count(&self) -> usize {
    self.items.len().saturating_sub(self.cursor)
  }

  /// Move to the next item. Cyclic modes wrap to 0 after the last item; the
  /// open-ended stream simply moves past the end until more items arrive.
  pub fn advance(&mut self) {
    if T::MODE.is_cyclic() {
      if self.items.is_empty() {
        return;
      }
      self.cursor = (self.cursor + 1) % self.items.len();
    } else {
      self.cursor += 1;
    }
    self.clear_item_state();
  }

  /// Move to the previous item, wrapping from 0 to the last index. Returns
  /// false (and does nothing) for the forward-only open-ended stream or an
  /// empty pool.
  pub fn rewind(&mut self) -> bool {
    if !T::MODE.is_cyclic() || self.items.is_empty() {
      return false;
    }
    let len = self.items.len();
    self.cursor = (self.cursor + len - 1) % len;
    self.clear_item_state();
    true
  }

  pub fn record_attempt(&mut self, correct: bool) {
    self.attempted += 1;
    if correct {
      self.score += 1;
    }
  }

  /// Select an option for the current item; ignored once it is answered.
  pub fn select_option(&mut self, letter: OptionLetter) -> bool {
    if self.answered {
      return false;
    }
    self.selected_option = Some(letter);
    true
  }

  pub fn mark_answered(&mut self) {
    self.answered = true;
  }

  /// Toggle the current card between front and back.
  pub fn toggle_flip(&mut self) -> bool {
    self.flipped = !self.flipped;
    self.flipped
  }

  /// Append items to the end of the pool; the cursor is untouched.
  pub fn append(&mut self, items: Vec<T>) -> usize {
    let n = items.len();
    self.items.extend(items);
    n
  }

  /// Start over on the same pool. Any in-flight result becomes stale.
  pub fn reset(&mut self) {
    self.epoch += 1;
    self.cursor = 0;
    self.score = 0;
    self.attempted = 0;
    self.gate = ReplenishGate::default();
    self.clear_item_state();
  }

  /// `round(score / attempted * 100)`, 0 before the first attempt.
  pub fn percent(&self) -> u32 {
    if self.attempted == 0 {
      return 0;
    }
    ((self.score as f64 / self.attempted as f64) * 100.0).round() as u32
  }

  /// Every item of a fixed pool has been attempted.
  pub fn is_finished(&self) -> bool {
    T::MODE == ModeKind::Mcq && !self.is_empty() && self.attempted as usize >= self.items.len()
  }

  pub fn view(&self) -> SessionView<T> {
    SessionView {
      session_id: self.id.clone(),
      mode: T::MODE,
      position: self.cursor + 1,
      total: T::MODE.is_cyclic().then_some(self.items.len()),
      remaining: self.remaining_count(),
      score: self.score,
      attempted: self.attempted,
      percent: self.percent(),
      current: self.current().map(|item| item.for_display(self.answered)),
      selected_option: self.selected_option,
      answered: self.answered,
      flipped: self.flipped,
      finished: self.is_finished(),
      replenishing: self.gate.in_flight(),
    }
  }

  fn clear_item_state(&mut self) {
    self.selected_option = None;
    self.answered = false;
    self.flipped = false;
  }
}
