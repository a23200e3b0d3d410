//! Mode selection and module sequencing.
//!
//! A request resolves to exactly one [`Mode`], and every mode resolves to an
//! ordered module sequence. Catalog order is execution order.

use crate::error::DiligentError;
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical Primary (audience research) sequence.
pub const PRIMARY_MODULES: [&str; 5] = [
    "foundational_research",
    "audience_segmentation",
    "persona_generation",
    "simulated_inquiry",
    "strategic_synthesis",
];

/// Canonical Extended (deep research) sequence.
pub const EXTENDED_MODULES: [&str; 10] = [
    "deep_reasoning",
    "deep_interpretation",
    "deep_intelligence",
    "deep_storytelling",
    "deep_quality_review",
    "deep_looping",
    "deep_signal_detection",
    "deep_synthesis",
    "deep_structure",
    "deep_aesthetics",
];

/// All-in-one Extended module. Selectable by name, never part of the default
/// sequence.
pub const DEEP_RESEARCH_COMPLETE: &str = "deep_research_complete";

/// Top-level workflow selector.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Five fixed audience-research steps.
    #[serde(rename = "dara")]
    Primary,
    /// Ten deep-research steps, or a caller-chosen subset.
    #[serde(rename = "dd10", alias = "didi")]
    Extended,
    /// Arbitrary caller-chosen steps.
    #[serde(rename = "custom")]
    Custom,
}

impl Mode {
    /// Wire name used in artifacts and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Primary => "dara",
            Mode::Extended => "dd10",
            Mode::Custom => "custom",
        }
    }

    /// The canonical catalog for this mode. Custom has none.
    pub fn catalog(&self) -> &'static [&'static str] {
        match self {
            Mode::Primary => &PRIMARY_MODULES,
            Mode::Extended => &EXTENDED_MODULES,
            Mode::Custom => &[],
        }
    }

    /// The catalog mode that owns `module`, if any.
    pub fn for_module(module: &str) -> Option<Mode> {
        if PRIMARY_MODULES.contains(&module) {
            Some(Mode::Primary)
        } else if EXTENDED_MODULES.contains(&module) || module == DEEP_RESEARCH_COMPLETE {
            Some(Mode::Extended)
        } else {
            None
        }
    }
}

/// Every spelling accepted when deserializing a [`Mode`], aliases included.
pub const MODE_WIRE_NAMES: [&str; 4] = ["dara", "dd10", "didi", "custom"];

/// Hand-written so the schema accepts the same aliases serde does.
impl JsonSchema for Mode {
    fn schema_name() -> String {
        "Mode".to_string()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(MODE_WIRE_NAMES.iter().map(|name| (*name).into()).collect()),
            ..Default::default()
        }
        .into()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = DiligentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dara" | "primary" => Ok(Mode::Primary),
            "dd10" | "didi" | "extended" => Ok(Mode::Extended),
            "custom" => Ok(Mode::Custom),
            _ => Err(DiligentError::UnknownMode(s.to_string())),
        }
    }
}

/// Caller-supplied request fields. Every field is optional; which ones are
/// required depends on the resolved mode.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ResearchInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_research_type(mut self, research_type: impl Into<String>) -> Self {
        self.research_type = Some(research_type.into());
        self
    }

    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Topic, treating an empty string as absent.
    pub fn topic(&self) -> Option<&str> {
        non_empty(self.topic.as_deref())
    }

    /// Region, treating an empty string as absent.
    pub fn region(&self) -> Option<&str> {
        non_empty(self.region.as_deref())
    }

    fn has_modules(&self) -> bool {
        self.modules.as_ref().is_some_and(|m| !m.is_empty())
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

/// Result of [`validate_input`]. Callers must check `success` before running
/// anything.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Convert into a `Result`, mapping failure to
    /// [`DiligentError::InputValidation`].
    pub fn into_result(self) -> Result<(), DiligentError> {
        if self.success {
            Ok(())
        } else {
            Err(DiligentError::InputValidation(
                self.message.unwrap_or_else(|| "invalid input".into()),
            ))
        }
    }
}

/// Pick the operating mode for a request.
///
/// An explicit mode wins. Otherwise topic + region means Primary, a research
/// type or module list means Extended, and anything else falls back to
/// Primary.
pub fn select_mode(input: &ResearchInput) -> Result<Mode, DiligentError> {
    if let Some(explicit) = non_empty(input.mode.as_deref()) {
        return explicit.parse();
    }
    if input.topic().is_some() && input.region().is_some() {
        return Ok(Mode::Primary);
    }
    if non_empty(input.research_type.as_deref()).is_some() || input.modules.is_some() {
        return Ok(Mode::Extended);
    }
    Ok(Mode::Primary)
}

/// Check that `input` carries the fields `mode` requires. Never fails hard.
pub fn validate_input(mode: Mode, input: &ResearchInput) -> ValidationOutcome {
    match mode {
        Mode::Primary => {
            if input.topic().is_none() {
                ValidationOutcome::failed("DARA mode requires a topic")
            } else if input.region().is_none() {
                ValidationOutcome::failed("DARA mode requires a geographic region")
            } else {
                ValidationOutcome::ok()
            }
        }
        Mode::Extended => {
            if input.topic().is_none() {
                ValidationOutcome::failed("DD10 mode requires a topic")
            } else {
                ValidationOutcome::ok()
            }
        }
        Mode::Custom => {
            if input.has_modules() {
                ValidationOutcome::ok()
            } else {
                ValidationOutcome::failed("Custom mode requires at least one module")
            }
        }
    }
}

/// Select and validate in one step. An unrecognized explicit mode is reported
/// as a failed outcome rather than an error.
pub fn validate_request(input: &ResearchInput) -> (Option<Mode>, ValidationOutcome) {
    match select_mode(input) {
        Ok(mode) => (Some(mode), validate_input(mode, input)),
        Err(_) => (None, ValidationOutcome::failed("Invalid mode selected")),
    }
}

/// Resolve the ordered modules to run. Performs no validation.
pub fn module_sequence(mode: Mode, input: &ResearchInput) -> Vec<String> {
    match mode {
        Mode::Primary => to_owned(&PRIMARY_MODULES),
        Mode::Extended => match &input.modules {
            Some(modules) if !modules.is_empty() => modules.clone(),
            _ => to_owned(&EXTENDED_MODULES),
        },
        Mode::Custom => input.modules.clone().unwrap_or_default(),
    }
}

fn to_owned(modules: &[&str]) -> Vec<String> {
    modules.iter().map(|m| (*m).to_string()).collect()
}
