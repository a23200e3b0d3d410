//! Convenience re-exports for common `diligent` types.
//!
//! ```ignore
//! use diligent::prelude::*;
//! ```
//!
//! Template internals (section markers, placeholder tables) and the HTTP
//! request/response structs are left out; import those from their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::config::PipelineConfig;
pub use crate::error::{DiligentError, ProviderError, TemplateError};
pub use crate::{OpenRouterClient, json_schema_for};

// ── Routing and prompts ─────────────────────────────────────────────
pub use crate::prompt::{
    BuiltinTemplates, DirTemplateSource, InMemoryTemplates, PromptAssembler, TemplateSource,
};
pub use crate::router::{Mode, ResearchInput, ValidationOutcome};

// ── Execution ───────────────────────────────────────────────────────
pub use crate::executor::{
    ChainExecutor, ChainResults, CompletionFuture, CompletionRequest, LlmClient, ModuleOutcome,
    ModuleResult,
};
pub use crate::service::{ChainRun, EnhanceRun, ResearchService};
pub use crate::session_log::{FileSessionLog, SessionEntry, SessionLog};

// ── Memory ──────────────────────────────────────────────────────────
pub use crate::memory::{
    Artifact, ArtifactListing, ArtifactMemory, ArtifactMetadata, ArtifactStatus, ArtifactSummary,
    Version,
};

// ── Reports ─────────────────────────────────────────────────────────
pub use crate::format::{
    ReportFormat, ReportMetadata, extract_highlights, render_json, render_markdown, write_report,
};
