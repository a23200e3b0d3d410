//! Sequential module execution against an LLM service.
//!
//! [`ChainExecutor::run_chain`] walks a module sequence in order. For each
//! module it assembles the prompt (carrying the previous module's output
//! forward), invokes the LLM, and when attached to an artifact appends the
//! answer as a new version. A failing module is recorded and the chain moves
//! on; the next module sees the last *successful* output.

use crate::OpenRouterClient;
use crate::config::PipelineConfig;
use crate::error::{DiligentError, ProviderError};
use crate::memory::ArtifactMemory;
use crate::prompt::PromptAssembler;
use crate::router::{Mode, ResearchInput};
use crate::session_log::{SessionEntry, SessionLog};
use crate::{ChatRequest, Message};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ── LLM seam ───────────────────────────────────────────────────────

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Boxed future returned by [`LlmClient::complete`].
pub type CompletionFuture<'a> = BoxFuture<'a, Result<String, ProviderError>>;

/// Anything that can turn a prompt into text. No retries are expected.
pub trait LlmClient: Send + Sync {
    fn complete(&self, request: CompletionRequest) -> CompletionFuture<'_>;
}

impl LlmClient for OpenRouterClient {
    fn complete(&self, request: CompletionRequest) -> CompletionFuture<'_> {
        async move {
            let body = ChatRequest {
                model: request.model,
                messages: vec![Message::system(request.system), Message::user(request.prompt)],
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            };
            let completion = self.chat(&body).await?;
            completion.content.ok_or(ProviderError::EmptyResponse)
        }
        .boxed()
    }
}

impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    fn complete(&self, request: CompletionRequest) -> CompletionFuture<'_> {
        (**self).complete(request)
    }
}

// ── Results ────────────────────────────────────────────────────────

/// What happened to one module.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ModuleOutcome {
    Completed {
        content: String,
    },
    #[serde(rename = "error")]
    Failed {
        error: String,
    },
}

impl ModuleOutcome {
    pub fn content(&self) -> Option<&str> {
        match self {
            ModuleOutcome::Completed { content } => Some(content),
            ModuleOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ModuleOutcome::Completed { .. } => None,
            ModuleOutcome::Failed { error } => Some(error),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ModuleOutcome::Completed { .. })
    }
}

/// A module id with its outcome.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModuleResult {
    pub module: String,
    #[serde(flatten)]
    pub outcome: ModuleOutcome,
}

/// Ordered outcomes of one chain run, one entry per requested module.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct ChainResults(Vec<ModuleResult>);

impl ChainResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, module: impl Into<String>, outcome: ModuleOutcome) {
        self.0.push(ModuleResult {
            module: module.into(),
            outcome,
        });
    }

    /// First outcome recorded for `module`.
    pub fn get(&self, module: &str) -> Option<&ModuleOutcome> {
        self.0
            .iter()
            .find(|r| r.module == module)
            .map(|r| &r.outcome)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModuleResult> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.0.iter().filter(|r| r.outcome.is_completed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.completed_count()
    }

    /// Output of the last module that succeeded.
    pub fn last_output(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|r| r.outcome.content())
    }
}

impl From<Vec<ModuleResult>> for ChainResults {
    fn from(results: Vec<ModuleResult>) -> Self {
        Self(results)
    }
}

impl<'a> IntoIterator for &'a ChainResults {
    type Item = &'a ModuleResult;
    type IntoIter = std::slice::Iter<'a, ModuleResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── Executor ───────────────────────────────────────────────────────

/// Artifact that successful module outputs are appended to.
struct Recorder<'a> {
    memory: &'a ArtifactMemory,
    artifact_id: String,
}

/// Drives a module sequence through the LLM, one module at a time.
pub struct ChainExecutor<'a> {
    client: &'a dyn LlmClient,
    config: &'a PipelineConfig,
    session_log: Option<&'a dyn SessionLog>,
    recorder: Option<Recorder<'a>>,
    version_prefix: String,
    seed_output: Option<String>,
}

impl<'a> ChainExecutor<'a> {
    pub fn new(client: &'a dyn LlmClient, config: &'a PipelineConfig) -> Self {
        Self {
            client,
            config,
            session_log: None,
            recorder: None,
            version_prefix: String::new(),
            seed_output: None,
        }
    }

    pub fn with_session_log(mut self, log: &'a dyn SessionLog) -> Self {
        self.session_log = Some(log);
        self
    }

    /// Append each successful output to `artifact_id` in `memory`.
    pub fn recording_to(
        mut self,
        memory: &'a ArtifactMemory,
        artifact_id: impl Into<String>,
    ) -> Self {
        self.recorder = Some(Recorder {
            memory,
            artifact_id: artifact_id.into(),
        });
        self
    }

    /// Prefix prepended to module ids when versions are appended.
    pub fn with_version_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.version_prefix = prefix.into();
        self
    }

    /// Output handed to the first module as its previous output.
    pub fn seeded_with(mut self, previous_output: Option<String>) -> Self {
        self.seed_output = previous_output.filter(|s| !s.is_empty());
        self
    }

    /// Send one prompt with the configured persona and sampling settings.
    pub async fn invoke(
        &self,
        prompt: &str,
        metadata: &serde_json::Value,
    ) -> Result<String, ProviderError> {
        let request = CompletionRequest {
            model: self.config.model.clone(),
            system: self.config.persona.clone(),
            prompt: prompt.to_string(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let text = self.client.complete(request).await?;
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        if let Some(log) = self.session_log {
            let entry = SessionEntry {
                timestamp: crate::now_rfc3339(),
                model: self.config.model.clone(),
                metadata: metadata.clone(),
                prompt: prompt.to_string(),
                response: text.clone(),
            };
            if let Err(e) = log.record(&entry) {
                warn!("Failed to write session log: {e}");
            }
        }

        Ok(text)
    }

    /// Run every module in `sequence`, in order.
    ///
    /// Fails only when the attached artifact does not exist before the first
    /// module runs. Per-module failures are returned as
    /// [`ModuleOutcome::Failed`] entries.
    pub async fn run_chain(
        &self,
        sequence: &[String],
        assembler: &PromptAssembler,
        mode: Mode,
        input: &ResearchInput,
        metadata: &serde_json::Value,
    ) -> Result<ChainResults, DiligentError> {
        if let Some(rec) = &self.recorder
            && !rec.memory.contains(&rec.artifact_id)
        {
            return Err(DiligentError::ArtifactNotFound(rec.artifact_id.clone()));
        }

        let mut results = ChainResults::new();
        let mut previous_output = self.seed_output.clone();
        let total = sequence.len();

        for (i, module) in sequence.iter().enumerate() {
            info!("Running module {}/{total}: {module}", i + 1);
            let outcome = self
                .run_module(module, assembler, mode, input, metadata, previous_output.as_deref())
                .await;

            match &outcome {
                ModuleOutcome::Completed { content } => {
                    info!("Module {module} completed ({} chars)", content.len());
                    previous_output = Some(content.clone());
                }
                ModuleOutcome::Failed { error } => {
                    warn!("Module {module} failed: {error}");
                }
            }
            results.push(module.clone(), outcome);
        }

        debug!(
            "Chain finished: {} completed, {} failed",
            results.completed_count(),
            results.failed_count()
        );
        Ok(results)
    }

    async fn run_module(
        &self,
        module: &str,
        assembler: &PromptAssembler,
        mode: Mode,
        input: &ResearchInput,
        metadata: &serde_json::Value,
        previous_output: Option<&str>,
    ) -> ModuleOutcome {
        let prompt = match assembler.module_prompt(module, mode, input, previous_output) {
            Ok(p) if !p.trim().is_empty() => p,
            Ok(_) => {
                return ModuleOutcome::Failed {
                    error: format!("empty prompt for module '{module}'"),
                };
            }
            Err(e) => {
                return ModuleOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let call_metadata = module_metadata(metadata, module, mode);
        let content = match self.invoke(&prompt, &call_metadata).await {
            Ok(text) => text,
            Err(e) => {
                return ModuleOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        if let Some(rec) = &self.recorder {
            let version_module = format!("{}{module}", self.version_prefix);
            let data = json!({ "content": content });
            if let Err(e) = rec
                .memory
                .append_version(&rec.artifact_id, &version_module, data)
            {
                return ModuleOutcome::Failed {
                    error: e.to_string(),
                };
            }
        }

        ModuleOutcome::Completed { content }
    }
}

/// Caller metadata plus the module and mode of one invocation.
fn module_metadata(metadata: &serde_json::Value, module: &str, mode: Mode) -> serde_json::Value {
    let mut merged = match metadata {
        serde_json::Value::Object(map) => map.clone(),
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("context".into(), other.clone());
            map
        }
    };
    merged.insert("module".into(), json!(module));
    merged.insert("mode".into(), json!(mode.as_str()));
    serde_json::Value::Object(merged)
}
