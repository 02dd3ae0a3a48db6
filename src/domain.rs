//! Domain models: the three record kinds produced from model responses, the
//! mode tag that keeps them apart, and the study material they are built from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which independently-tracked session a record belongs to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
  /// Open-ended exam: a forward-only, replenished question stream.
  OpenEnded,
  /// Multiple-choice exam: fixed pool, cyclic navigation.
  Mcq,
  /// Flashcard deck: fixed pool, cyclic navigation.
  Flashcard,
}

impl ModeKind {
  /// Fixed-size pools wrap around; the open-ended stream only moves forward.
  pub fn is_cyclic(self) -> bool {
    !matches!(self, ModeKind::OpenEnded)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      ModeKind::OpenEnded => "open_ended",
      ModeKind::Mcq => "mcq",
      ModeKind::Flashcard => "flashcard",
    }
  }
}

impl fmt::Display for ModeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One open-ended exam question.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenQuestion {
  pub text: String,
}

/// Letter of a multiple-choice option.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OptionLetter {
  A,
  B,
  C,
  D,
}

impl OptionLetter {
  pub fn from_char(c: char) -> Option<Self> {
    match c.to_ascii_uppercase() {
      'A' => Some(OptionLetter::A),
      'B' => Some(OptionLetter::B),
      'C' => Some(OptionLetter::C),
      'D' => Some(OptionLetter::D),
      _ => None,
    }
  }

  pub fn as_char(self) -> char {
    match self {
      OptionLetter::A => 'A',
      OptionLetter::B => 'B',
      OptionLetter::C => 'C',
      OptionLetter::D => 'D',
    }
  }
}

impl fmt::Display for OptionLetter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_char())
  }
}

impl FromStr for OptionLetter {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut chars = s.trim().chars();
    match (chars.next(), chars.next()) {
      (Some(c), None) => OptionLetter::from_char(c).ok_or_else(|| format!("not an option letter: {s}")),
      _ => Err(format!("not an option letter: {s}")),
    }
  }
}

/// Multiple-choice item. `options` keeps the model's lines verbatim
/// ("A) ..."), in order; `correct_letter` is `None` when the model omitted
/// or garbled the `CORRECT:` line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct McqItem {
  pub question: String,
  pub options: Vec<String>,
  pub correct_letter: Option<OptionLetter>,
  pub explanation: String,
}

/// Front/back pair. Both sides are non-empty by construction in the parser.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlashCard {
  pub front: String,
  pub back: String,
}

/// Reference to a file already uploaded to the generation API.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
  pub name: String,
  pub uri: String,
  #[serde(rename = "mimeType")]
  pub mime_type: String,
}

/// Read-only study material prepared by ingestion: pasted text plus file
/// references, merged into one `combined` string used inside prompts.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StudyMaterial {
  pub text: String,
  pub files: Vec<FileRef>,
  pub combined: String,
}

impl StudyMaterial {
  /// Returns `None` when there is neither text nor a file.
  pub fn new(text: &str, files: Vec<FileRef>) -> Option<Self> {
    let text = text.trim();
    if text.is_empty() && files.is_empty() {
      return None;
    }

    let mut combined = files
      .iter()
      .map(|f| format!("[Uploaded file: {}]", f.name))
      .collect::<Vec<_>>()
      .join("\n");
    if !text.is_empty() {
      if !combined.is_empty() {
        combined.push_str("\n\n");
      }
      combined.push_str(text);
    }

    Some(Self { text: text.to_string(), files, combined })
  }
}
