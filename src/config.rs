//! Loading study configuration (prompts, generation settings, session tuning)
//! from TOML.
//!
//! Every section and field is optional; anything missing keeps its default.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct StudyConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationSettings,
  #[serde(default)]
  pub session: SessionSettings,
}

/// Prompt templates. Placeholders: `{content}` (combined study material),
/// `{open_count}`, `{mcq_count}`, `{count}`, `{previous}`, `{question}`, `{answer}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub study_guide_template: String,
  pub exam_template: String,
  pub replenish_template: String,
  pub flashcard_template: String,
  pub evaluation_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      study_guide_template: "Analyze the following content and create a comprehensive study guide. Include:
1. Main concepts and key points
2. Detailed explanations
3. Important definitions
4. Summary of critical information

Use markdown formatting for better readability (bold, italics, lists, etc.).

Content to analyze:
{content}"
        .into(),
      exam_template: "Generate exam content with:

1. {open_count} challenging open-ended questions
2. {mcq_count} multiple choice questions with 4 options each

Content:
{content}

CRITICAL: Separate each question with --- on a new line.

For OPEN-ENDED questions, format EXACTLY as:
Q1: [question text]
---
Q2: [question text]
---
(continue for all {open_count} questions)

For MULTIPLE CHOICE questions, format EXACTLY as:
MCQ1: [question text]
A) [option]
B) [option]
C) [option]
D) [option]
CORRECT: [letter]
EXPLANATION: [brief explanation]
---
MCQ2: [question text]
(continue for all {mcq_count} questions)

Do NOT include any preamble text. Just provide the questions directly."
        .into(),
      replenish_template: "Generate {count} MORE challenging open-ended questions that are DIFFERENT from previous ones.

Previous questions:
{previous}

Content:
{content}

CRITICAL: Separate each question with --- on a new line.

Format EXACTLY as:
Q1: [question text]
---
Q2: [question text]
---
(continue for all {count} questions)

Do NOT include any preamble text. Just provide the questions directly."
        .into(),
      flashcard_template: "Create {count} flashcards from this content. For each card:
- Front: A question or term
- Back: The answer or definition

Content:
{content}

Format flashcards as:
CARD1-FRONT: [question]
CARD1-BACK: [answer]
---
CARD2-FRONT: [question]
CARD2-BACK: [answer]
---

Do NOT include any preamble text."
        .into(),
      evaluation_template: "Review this exam answer. Do NOT include preamble text. Respond in this exact format:

RESULT: [CORRECT/PARTIALLY CORRECT/INCORRECT]

If CORRECT: Briefly explain why it's right (2-3 sentences).
If INCORRECT or PARTIALLY CORRECT:
- What's wrong or missing (be specific)
- The correct answer with explanation

Question: {question}
Student Answer: {answer}

Context:
{content}"
        .into(),
    }
  }
}

/// Sampling parameters sent with every generation request.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  pub temperature: f32,
  pub top_k: u32,
  pub top_p: f32,
  pub max_output_tokens: u32,
  pub timeout_secs: u64,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self { temperature: 0.7, top_k: 40, top_p: 0.95, max_output_tokens: 8192, timeout_secs: 120 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
  /// Replenish when `remaining <= replenish_threshold`.
  pub replenish_threshold: usize,
  pub replenish_batch: usize,
  pub previous_questions_in_prompt: usize,
  pub open_question_count: usize,
  pub mcq_count: usize,
  pub flashcard_count: usize,
  /// HTTP workspaces untouched for this long are dropped; 0 keeps them forever.
  pub workspace_idle_ttl_secs: u64,
}

impl Default for SessionSettings {
  fn default() -> Self {
    Self {
      replenish_threshold: 2,
      replenish_batch: 5,
      previous_questions_in_prompt: 10,
      open_question_count: 5,
      mcq_count: 15,
      flashcard_count: 30,
      workspace_idle_ttl_secs: 3600,
    }
  }
}

/// Load `StudyConfig` from STUDY_CONFIG_PATH. Missing variable, IO or parse
/// errors fall back to defaults (errors are logged).
pub fn load_config_from_env() -> StudyConfig {
  let Ok(path) = std::env::var("STUDY_CONFIG_PATH") else {
    return StudyConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<StudyConfig>(&s) {
      Ok(cfg) => {
        info!(target: "letmecook_backend", %path, "Loaded study config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "letmecook_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
        StudyConfig::default()
      }
    },
    Err(e) => {
      error!(target: "letmecook_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
      StudyConfig::default()
    }
  }
}
