//! Response parsing: turns one free-form model response into typed records.
//!
//! The prompts ask for a small delimiter grammar:
//!
//! ```text
//! Q1: question text          MCQ1: question text        CARD1-FRONT: term
//! ---                        A) option ... D) option    CARD1-BACK: definition
//! Q2: question text          CORRECT: B                 ---
//! ---                        EXPLANATION: because
//!                            ---
//! ```
//!
//! Models drift from it (missing `---`, leaked preamble, options bleeding into
//! the open-ended section), so every step degrades instead of failing:
//! malformed segments are dropped and an empty result is a valid output.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::domain::{FlashCard, McqItem, ModeKind, OpenQuestion, OptionLetter};

/// Filler lines models like to prepend. Each pattern removes its first match only.
static PREAMBLES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
  [
    r"(?im)^.*?(?:here are|okay,?\s*here are).*?questions.*?$",
    r"(?im)^.*?based on.*?content.*?$",
    r"(?im)^.*?following questions.*?$",
  ]
  .iter()
  .map(|p| Regex::new(p).expect("valid preamble pattern"))
  .collect()
});

static MCQ_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)MCQ1:").expect("valid marker pattern"));

/// `---` on a line of its own.
static DELIMITER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*-{3,}[ \t]*$").expect("valid delimiter pattern"));

static Q_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Q\d+:").expect("valid label pattern"));

static LEADING_Q_LABEL: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)^(?:\*\*)?Q\d+:(?:\*\*)?\s*").expect("valid label pattern"));

static LEADING_MCQ_LABEL: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)^(?:\*\*)?MCQ\d+:(?:\*\*)?\s*").expect("valid label pattern"));

/// First line that looks like a multiple-choice option.
static OPTION_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[A-D]\)").expect("valid option pattern"));

static OPTION_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[A-D]\)").expect("valid option pattern"));

static CORRECT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\bCORRECT:\s*([A-D])\b").expect("valid correct pattern"));

static EXPLANATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)EXPLANATION:\s*(.+)").expect("valid explanation pattern"));

/// Both pools produced by one mixed exam response.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct ExamBatch {
  pub open: Vec<OpenQuestion>,
  pub mcq: Vec<McqItem>,
}

/// Records of a single kind, as returned by [`parse`].
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum ParsedItems {
  OpenEnded(Vec<OpenQuestion>),
  Mcq(Vec<McqItem>),
  Flashcard(Vec<FlashCard>),
}

impl ParsedItems {
  pub fn len(&self) -> usize {
    match self {
      ParsedItems::OpenEnded(v) => v.len(),
      ParsedItems::Mcq(v) => v.len(),
      ParsedItems::Flashcard(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Parse `raw` as records of `kind`. Never fails.
pub fn parse(raw: &str, kind: ModeKind) -> ParsedItems {
  match kind {
    ModeKind::OpenEnded => ParsedItems::OpenEnded(parse_open_questions(raw)),
    ModeKind::Mcq => ParsedItems::Mcq(parse_mcqs(raw)),
    ModeKind::Flashcard => ParsedItems::Flashcard(parse_flashcards(raw)),
  }
}

/// Remove known filler lines. Line endings are normalized to `\n` first.
pub fn strip_preamble(raw: &str) -> String {
  let mut out = raw.replace("\r\n", "\n");
  for pattern in PREAMBLES.iter() {
    out = pattern.replace(&out, "").into_owned();
  }
  out
}

/// Split a mixed response at the first `MCQ1:` marker. Without the marker
/// the whole body is open-ended and the MCQ section is empty.
fn split_sections(body: &str) -> (&str, &str) {
  match MCQ_MARKER.find(body) {
    Some(m) => (&body[..m.start()], &body[m.start()..]),
    None => (body, ""),
  }
}

/// Parse a mixed open-ended + MCQ exam response.
pub fn parse_exam(raw: &str) -> ExamBatch {
  let body = strip_preamble(raw);
  let (open_section, mcq_section) = split_sections(&body);
  let batch = ExamBatch {
    open: open_questions_from_section(open_section),
    mcq: mcqs_from_section(mcq_section),
  };
  debug!(target: "parser", open = batch.open.len(), mcq = batch.mcq.len(), raw_len = raw.len(), "Parsed exam response");
  batch
}

/// Parse an open-ended-only response (e.g. a replenishment batch). Anything
/// from an `MCQ1:` marker onward is ignored.
pub fn parse_open_questions(raw: &str) -> Vec<OpenQuestion> {
  let body = strip_preamble(raw);
  let (open_section, _) = split_sections(&body);
  let questions = open_questions_from_section(open_section);
  debug!(target: "parser", count = questions.len(), raw_len = raw.len(), "Parsed open-ended response");
  questions
}

/// Parse an MCQ-only response; the whole body is the MCQ section.
pub fn parse_mcqs(raw: &str) -> Vec<McqItem> {
  let body = strip_preamble(raw);
  let items = mcqs_from_section(&body);
  debug!(target: "parser", count = items.len(), raw_len = raw.len(), "Parsed MCQ response");
  items
}

fn open_questions_from_section(section: &str) -> Vec<OpenQuestion> {
  let segments: Vec<&str> = if DELIMITER.is_match(section) {
    DELIMITER.split(section).collect()
  } else {
    let labels: Vec<usize> = Q_LABEL.find_iter(section).map(|m| m.start()).collect();
    if labels.is_empty() {
      vec![section]
    } else {
      // Each segment runs from one label to the next (or to the end).
      labels
        .iter()
        .enumerate()
        .map(|(i, &start)| {
          let end = labels.get(i + 1).copied().unwrap_or(section.len());
          &section[start..end]
        })
        .collect()
    }
  };

  segments
    .into_iter()
    .filter_map(clean_open_segment)
    .map(|text| OpenQuestion { text })
    .collect()
}

fn clean_open_segment(segment: &str) -> Option<String> {
  let text = LEADING_Q_LABEL.replace(segment.trim(), "");
  // Options bleeding in from a mis-split MCQ section end the question.
  let text = match OPTION_LINE.find(&text) {
    Some(m) => &text[..m.start()],
    None => &text[..],
  };
  let text = text.trim();
  (!text.is_empty()).then(|| text.to_string())
}

fn mcqs_from_section(section: &str) -> Vec<McqItem> {
  let mut dropped = 0usize;
  let items: Vec<McqItem> = DELIMITER
    .split(section)
    .filter(|s| !s.trim().is_empty())
    .filter_map(|segment| {
      let item = parse_mcq_segment(segment);
      if item.is_none() {
        dropped += 1;
      }
      item
    })
    .collect();
  if dropped > 0 {
    debug!(target: "parser", dropped, kept = items.len(), "Dropped malformed MCQ segments");
  }
  items
}

fn parse_mcq_segment(segment: &str) -> Option<McqItem> {
  let lines: Vec<&str> = segment.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

  let question = LEADING_MCQ_LABEL.replace(lines.first()?, "").trim().to_string();
  let options: Vec<String> = lines
    .iter()
    .filter(|l| OPTION_PREFIX.is_match(l))
    .map(|l| l.to_string())
    .collect();
  if question.is_empty() || options.is_empty() {
    return None;
  }

  let correct_letter = CORRECT
    .captures(segment)
    .and_then(|c| c.get(1))
    .and_then(|m| m.as_str().chars().next())
    .and_then(OptionLetter::from_char);
  let explanation = EXPLANATION
    .captures(segment)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().trim().to_string())
    .unwrap_or_default();

  Some(McqItem { question, options, correct_letter, explanation })
}

/// Parse a flashcard response. Cards missing either side are dropped.
pub fn parse_flashcards(raw: &str) -> Vec<FlashCard> {
  let body = raw.replace("\r\n", "\n");
  let cards: Vec<FlashCard> = DELIMITER
    .split(&body)
    .filter(|s| !s.trim().is_empty())
    .filter_map(|segment| {
      let front = labelled_value(segment, "FRONT:")?;
      let back = labelled_value(segment, "BACK:")?;
      Some(FlashCard { front, back })
    })
    .collect();
  debug!(target: "parser", count = cards.len(), raw_len = raw.len(), "Parsed flashcard response");
  cards
}

/// Text after `label` on the first line containing it, if non-empty.
fn labelled_value(segment: &str, label: &str) -> Option<String> {
  let line = segment.lines().find(|l| l.contains(label))?;
  let (_, after) = line.split_once(label)?;
  let value = after.trim();
  (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn texts(qs: &[OpenQuestion]) -> Vec<&str> {
    qs.iter().map(|q| q.text.as_str()).collect()
  }

  #[test]
  fn delimited_questions_keep_order() {
    let qs = parse_open_questions("Q1: What is X?\n---\nQ2: What is Y?\n---");
    assert_eq!(texts(&qs), vec!["What is X?", "What is Y?"]);
  }

  #[test]
  fn one_record_per_delimited_segment() {
    let raw = "Q1: First?\n---\nQ2: Second,\nacross two lines?\n---\nQ3: Third?\n";
    let qs = parse_open_questions(raw);
    assert_eq!(texts(&qs), vec!["First?", "Second,\nacross two lines?", "Third?"]);
  }

  #[test]
  fn falls_back_to_labels_without_delimiters() {
    let raw = "Q1: Explain osmosis.\nQ2: Define entropy.\n\nQ3: Why is the sky blue?";
    let qs = parse_open_questions(raw);
    assert_eq!(texts(&qs), vec!["Explain osmosis.", "Define entropy.", "Why is the sky blue?"]);
  }

  #[test]
  fn label_fallback_ignores_text_before_first_label() {
    let qs = parse_open_questions("Sure thing!\nQ1: Explain osmosis.\nQ2: Define entropy.");
    assert_eq!(texts(&qs), vec!["Explain osmosis.", "Define entropy."]);
  }

  #[test]
  fn unlabelled_section_is_one_question() {
    let qs = parse_open_questions("  Describe the water cycle in detail.  ");
    assert_eq!(texts(&qs), vec!["Describe the water cycle in detail."]);
    assert!(parse_open_questions("   \n  ").is_empty());
  }

  #[test]
  fn leaked_options_are_truncated() {
    let raw = "Q1: Which organelle makes ATP?\nA) Nucleus\nB) Mitochondria\n---\nQ2: Define diffusion.";
    let qs = parse_open_questions(raw);
    assert_eq!(texts(&qs), vec!["Which organelle makes ATP?", "Define diffusion."]);

    let fallback = parse_open_questions("Q1: Name a noble gas.\nA) Neon\nB) Iron");
    assert_eq!(texts(&fallback), vec!["Name a noble gas."]);
  }

  #[test]
  fn segment_made_only_of_options_is_dropped() {
    let qs = parse_open_questions("Q1: Real question?\n---\nA) stray\nB) options\n---");
    assert_eq!(texts(&qs), vec!["Real question?"]);
  }

  #[test]
  fn preamble_lines_are_removed() {
    let raw = "Okay, here are 5 questions for you:\nQ1: What is X?\n---\nQ2: What is Y?\n---";
    let qs = parse_open_questions(raw);
    assert_eq!(texts(&qs), vec!["What is X?", "What is Y?"]);

    let raw = "Based on the provided content, I wrote these.\n---\nQ1: What is X?\n---";
    assert_eq!(texts(&parse_open_questions(raw)), vec!["What is X?"]);
  }

  #[test]
  fn each_preamble_pattern_applies_once() {
    let raw = "See the following questions\n---\nQ1: Which following questions matter?\n---";
    let qs = parse_open_questions(raw);
    assert_eq!(texts(&qs), vec!["Which following questions matter?"]);
  }

  #[test]
  fn crlf_responses_parse_like_lf() {
    let qs = parse_open_questions("Q1: What is X?\r\n---\r\nQ2: What is Y?\r\n---\r\n");
    assert_eq!(texts(&qs), vec!["What is X?", "What is Y?"]);
  }

  #[test]
  fn single_mcq_block() {
    let raw = "MCQ1: Pick one\nA) foo\nB) bar\nC) baz\nD) qux\nCORRECT: B\nEXPLANATION: because\n---";
    let items = parse_mcqs(raw);
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.question, "Pick one");
    assert_eq!(item.options, vec!["A) foo", "B) bar", "C) baz", "D) qux"]);
    assert_eq!(item.correct_letter, Some(OptionLetter::B));
    assert_eq!(item.explanation, "because");
  }

  #[test]
  fn mcq_letter_is_uppercased_and_optional() {
    let raw = "MCQ1: One\nA) x\nB) y\ncorrect: c\n---\nMCQ2: Two\nA) x\nB) y\n---";
    let items = parse_mcqs(raw);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].correct_letter, Some(OptionLetter::C));
    assert_eq!(items[1].correct_letter, None);
    assert_eq!(items[1].explanation, "");
  }

  #[test]
  fn mcq_without_options_is_dropped() {
    let raw = "MCQ1: Has options\nA) yes\nCORRECT: A\n---\nMCQ2: No options here\nCORRECT: A\n---\nThat's all, good luck!";
    let items = parse_mcqs(raw);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].question, "Has options");
  }

  #[test]
  fn exam_response_splits_at_first_mcq_marker() {
    let raw = "Here are the questions you asked for:\nQ1: Explain X.\n---\nQ2: Explain Y.\n---\n\
               MCQ1: Pick X\nA) 1\nB) 2\nC) 3\nD) 4\nCORRECT: A\nEXPLANATION: first\n---\n\
               MCQ2: Pick Y\nA) 1\nB) 2\nC) 3\nD) 4\nCORRECT: D\nEXPLANATION: last\n---";
    let batch = parse_exam(raw);
    assert_eq!(texts(&batch.open), vec!["Explain X.", "Explain Y."]);
    assert_eq!(batch.mcq.len(), 2);
    assert_eq!(batch.mcq[1].correct_letter, Some(OptionLetter::D));
  }

  #[test]
  fn exam_without_marker_has_no_mcqs() {
    let batch = parse_exam("Q1: Explain X.\n---\nQ2: Explain Y.");
    assert_eq!(batch.open.len(), 2);
    assert!(batch.mcq.is_empty());
  }

  #[test]
  fn exam_with_only_mcqs_has_no_open_questions() {
    let batch = parse_exam("MCQ1: Pick one\nA) foo\nB) bar\nCORRECT: A\n---");
    assert!(batch.open.is_empty());
    assert_eq!(batch.mcq.len(), 1);
  }

  #[test]
  fn flashcards_need_both_sides() {
    let raw = "CARD1-FRONT: Mitosis\nCARD1-BACK: Cell division\n---\n\
               CARD2-FRONT: Orphan\n---\n\
               CARD3-FRONT: ATP\nCARD3-BACK:   \n---\n\
               CARD4-FRONT: DNA\nCARD4-BACK: Genetic material\n---";
    let cards = parse_flashcards(raw);
    assert_eq!(
      cards,
      vec![
        FlashCard { front: "Mitosis".into(), back: "Cell division".into() },
        FlashCard { front: "DNA".into(), back: "Genetic material".into() },
      ]
    );
  }

  #[test]
  fn parse_dispatches_on_kind() {
    let parsed = parse("CARD1-FRONT: a\nCARD1-BACK: b\n---", ModeKind::Flashcard);
    assert_eq!(parsed.len(), 1);
    assert!(matches!(parsed, ParsedItems::Flashcard(_)));
    assert!(parse("", ModeKind::Mcq).is_empty());
  }
}
