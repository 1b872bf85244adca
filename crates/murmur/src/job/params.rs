//! Transcription parameters captured at submission time.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MurmurError;
use crate::formatter::OutputFormat;

/// Whisper model size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub const ALL: [ModelSize; 5] = [
        ModelSize::Tiny,
        ModelSize::Base,
        ModelSize::Small,
        ModelSize::Medium,
        ModelSize::Large,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = MurmurError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelSize::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| MurmurError::InvalidParameter {
                field: "model",
                reason: format!("unknown model size '{}'", s),
            })
    }
}

/// What the model should do with the audio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    #[default]
    Transcribe,
    Translate,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Transcribe => "transcribe",
            Task::Translate => "translate",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = MurmurError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcribe" => Ok(Task::Transcribe),
            "translate" => Ok(Task::Translate),
            other => Err(MurmurError::InvalidParameter {
                field: "task",
                reason: format!("unknown task '{}'", other),
            }),
        }
    }
}

fn default_output_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Json]
}

fn default_beam_size() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_vad_threshold() -> f32 {
    0.5
}

static RE_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{2,8})?$").unwrap());

/// Immutable configuration snapshot for one job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionParams {
    #[serde(default)]
    pub model: ModelSize,
    /// Source language code; `None` lets the model detect it.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub task: Task,
    #[serde(default = "default_output_formats", alias = "outputFormat")]
    pub output_formats: Vec<OutputFormat>,
    #[serde(default)]
    pub initial_prompt: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_beam_size")]
    pub beam_size: u32,
    #[serde(default)]
    pub patience: Option<f32>,
    #[serde(default)]
    pub suppress_tokens: Vec<i32>,
    #[serde(default = "default_true")]
    pub condition_on_previous_text: bool,
    #[serde(default = "default_true")]
    pub fp16: bool,
    #[serde(default)]
    pub word_timestamps: bool,
    #[serde(default = "default_true")]
    pub vad_filter: bool,
    #[serde(default = "default_vad_threshold")]
    pub vad_threshold: f32,
}

impl Default for TranscriptionParams {
    fn default() -> Self {
        Self {
            model: ModelSize::default(),
            language: None,
            task: Task::default(),
            output_formats: default_output_formats(),
            initial_prompt: None,
            temperature: 0.0,
            beam_size: default_beam_size(),
            patience: None,
            suppress_tokens: Vec::new(),
            condition_on_previous_text: true,
            fp16: true,
            word_timestamps: false,
            vad_filter: true,
            vad_threshold: default_vad_threshold(),
        }
    }
}

impl TranscriptionParams {
    /// Parses request parameters from a JSON value. Malformed values
    /// (unknown model, negative beam size, ...) become `InvalidParameter`.
    pub fn from_json(value: serde_json::Value) -> Result<Self, MurmurError> {
        let params: Self =
            serde_json::from_value(value).map_err(|e| MurmurError::InvalidParameter {
                field: "parameters",
                reason: e.to_string(),
            })?;
        params.validate()
    }

    /// Checks every constraint and returns the normalized parameters.
    ///
    /// Duplicate output formats are collapsed, keeping first-seen order.
    pub fn validate(mut self) -> Result<Self, MurmurError> {
        if self.output_formats.is_empty() {
            return Err(MurmurError::InvalidParameter {
                field: "output_format",
                reason: "at least one output format is required".to_string(),
            });
        }
        let mut seen = Vec::with_capacity(self.output_formats.len());
        self.output_formats.retain(|f| {
            if seen.contains(f) {
                false
            } else {
                seen.push(*f);
                true
            }
        });

        if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
            return Err(MurmurError::InvalidParameter {
                field: "temperature",
                reason: format!("must be within [0, 1], got {}", self.temperature),
            });
        }

        if self.beam_size == 0 {
            return Err(MurmurError::InvalidParameter {
                field: "beam_size",
                reason: "must be a positive integer".to_string(),
            });
        }

        if let Some(patience) = self.patience {
            if !patience.is_finite() || patience <= 0.0 {
                return Err(MurmurError::InvalidParameter {
                    field: "patience",
                    reason: format!("must be positive, got {}", patience),
                });
            }
        }

        if !self.vad_threshold.is_finite() || !(0.0..=1.0).contains(&self.vad_threshold) {
            return Err(MurmurError::InvalidParameter {
                field: "vad_threshold",
                reason: format!("must be within [0, 1], got {}", self.vad_threshold),
            });
        }

        if let Some(language) = &self.language {
            if !RE_LANGUAGE.is_match(language) {
                return Err(MurmurError::InvalidParameter {
                    field: "language",
                    reason: format!("'{}' is not a language code", language),
                });
            }
        }

        Ok(self)
    }

    pub fn requests(&self, format: OutputFormat) -> bool {
        self.output_formats.contains(&format)
    }
}
