//! The caller-facing research service.
//!
//! [`ResearchService`] owns one prompt assembler, one artifact memory, one
//! LLM client and the optional session log. The CLI and the web crate both
//! go through it; nothing in the pipeline is global.

use crate::config::PipelineConfig;
use crate::error::DiligentError;
use crate::executor::{ChainExecutor, ChainResults, LlmClient};
use crate::format::ReportMetadata;
use crate::memory::{
    Artifact, ArtifactListing, ArtifactMemory, ArtifactMetadata, ArtifactSummary,
    generate_session_id,
};
use crate::prompt::{DirTemplateSource, PromptAssembler};
use crate::router::{self, Mode, ResearchInput};
use crate::session_log::{FileSessionLog, SessionLog};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Version-module prefix for enhancement passes.
pub const ENHANCEMENT_PREFIX: &str = "didi_";

/// Result of [`ResearchService::run_chain`].
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChainRun {
    pub artifact_id: String,
    pub mode: Mode,
    pub metadata: ArtifactMetadata,
    pub results: ChainResults,
}

impl ChainRun {
    pub fn report_metadata(&self) -> ReportMetadata {
        ReportMetadata {
            session_id: Some(self.artifact_id.clone()),
            mode: Some(self.mode.as_str().to_string()),
            topic: self.metadata.topic.clone(),
            region: self.metadata.region.clone(),
            generated: crate::now_rfc3339(),
        }
    }
}

/// Result of [`ResearchService::enhance`].
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceRun {
    pub artifact_id: String,
    pub results: ChainResults,
}

pub struct ResearchService {
    client: Arc<dyn LlmClient>,
    config: PipelineConfig,
    assembler: PromptAssembler,
    memory: Arc<ArtifactMemory>,
    session_log: Option<Box<dyn SessionLog>>,
}

impl ResearchService {
    /// Build a service from `config`: templates come from
    /// `config.templates_dir` (or the built-in set) and a file session log is
    /// attached when `config.log_sessions` is set.
    pub fn new(client: impl LlmClient + 'static, config: PipelineConfig) -> Self {
        let assembler = match &config.templates_dir {
            Some(dir) => PromptAssembler::new(DirTemplateSource::new(dir)),
            None => PromptAssembler::builtin(),
        };
        let session_log: Option<Box<dyn SessionLog>> = if config.log_sessions {
            Some(Box::new(FileSessionLog::new(&config.logs_dir)))
        } else {
            None
        };
        Self {
            client: Arc::new(client),
            config,
            assembler,
            memory: Arc::new(ArtifactMemory::new()),
            session_log,
        }
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Share an existing artifact store.
    pub fn with_memory(mut self, memory: Arc<ArtifactMemory>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_session_log(mut self, log: impl SessionLog + 'static) -> Self {
        self.session_log = Some(Box::new(log));
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn memory(&self) -> &Arc<ArtifactMemory> {
        &self.memory
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }

    fn executor(&self) -> ChainExecutor<'_> {
        let executor = ChainExecutor::new(self.client.as_ref(), &self.config);
        match &self.session_log {
            Some(log) => executor.with_session_log(log.as_ref()),
            None => executor,
        }
    }

    // ── Runs ───────────────────────────────────────────────────────

    /// Start a new session and return its artifact id.
    pub fn create_session(&self, metadata: ArtifactMetadata) -> String {
        let id = generate_session_id();
        self.memory.create_artifact(&id, metadata);
        id
    }

    /// Run one module against an existing artifact, chaining from the
    /// artifact's latest content.
    pub async fn run_module(
        &self,
        artifact_id: &str,
        mode: Mode,
        module: &str,
        input: &ResearchInput,
    ) -> Result<String, DiligentError> {
        if !self.memory.contains(artifact_id) {
            return Err(DiligentError::ArtifactNotFound(artifact_id.to_string()));
        }
        let previous = self.memory.latest_content(artifact_id);
        let prompt = self
            .assembler
            .module_prompt(module, mode, input, previous.as_deref())?;

        let metadata = json!({
            "sessionId": artifact_id,
            "module": module,
            "mode": mode.as_str(),
        });
        let content = self.executor().invoke(&prompt, &metadata).await?;
        self.memory
            .append_version(artifact_id, module, json!({ "content": content }))?;
        Ok(content)
    }

    /// Validate `input`, open a session and run its whole module sequence.
    pub async fn run_chain(&self, input: &ResearchInput) -> Result<ChainRun, DiligentError> {
        let mode = router::select_mode(input)?;
        router::validate_input(mode, input).into_result()?;
        let sequence = router::module_sequence(mode, input);

        let metadata = ArtifactMetadata::new(
            mode,
            input.topic().map(str::to_string),
            input.region().map(str::to_string),
        )
        .with_notes(input.notes.clone().unwrap_or_default());
        let artifact_id = self.create_session(metadata.clone());
        info!(
            "Session {artifact_id}: running {} module(s) in {mode} mode",
            sequence.len()
        );

        let log_metadata = json!({
            "sessionId": artifact_id,
            "topic": metadata.topic,
            "region": metadata.region,
        });
        let results = self
            .executor()
            .recording_to(&self.memory, artifact_id.clone())
            .run_chain(&sequence, &self.assembler, mode, input, &log_metadata)
            .await?;
        self.memory.mark_completed(&artifact_id)?;

        Ok(ChainRun {
            artifact_id,
            mode,
            metadata,
            results,
        })
    }

    /// Run Extended modules over an existing artifact. Versions are appended
    /// as `didi_<module>` and the first module is seeded with the artifact's
    /// latest content.
    pub async fn enhance(
        &self,
        artifact_id: &str,
        modules: &[String],
    ) -> Result<EnhanceRun, DiligentError> {
        let artifact = self
            .memory
            .get_artifact(artifact_id)
            .ok_or_else(|| DiligentError::ArtifactNotFound(artifact_id.to_string()))?;
        if modules.is_empty() {
            return Err(DiligentError::InputValidation(
                "at least one enhancement module is required".into(),
            ));
        }

        let mut input = ResearchInput::new().with_modules(modules.iter().cloned());
        input.topic = artifact.metadata.topic.clone();
        input.region = artifact.metadata.region.clone();

        info!(
            "Session {artifact_id}: enhancing with {} module(s)",
            modules.len()
        );
        let log_metadata = json!({
            "sessionId": artifact_id,
            "enhancement": true,
        });
        let results = self
            .executor()
            .recording_to(&self.memory, artifact_id)
            .with_version_prefix(ENHANCEMENT_PREFIX)
            .seeded_with(artifact.latest_content().map(str::to_string))
            .run_chain(modules, &self.assembler, Mode::Extended, &input, &log_metadata)
            .await?;

        Ok(EnhanceRun {
            artifact_id: artifact_id.to_string(),
            results,
        })
    }

    // ── Artifact access ────────────────────────────────────────────

    pub fn get_artifact(&self, artifact_id: &str) -> Option<Artifact> {
        self.memory.get_artifact(artifact_id)
    }

    pub fn list_artifacts(&self) -> Vec<ArtifactListing> {
        self.memory.list_artifacts()
    }

    pub fn get_summary(&self, artifact_id: &str) -> Option<ArtifactSummary> {
        self.memory.get_summary(artifact_id)
    }

    pub fn export_artifact(&self, artifact_id: &str) -> Result<String, DiligentError> {
        self.memory.export_artifact(artifact_id)
    }

    pub fn import_artifact(&self, text: &str) -> Result<Artifact, DiligentError> {
        self.memory.import_artifact(text)
    }

    pub fn delete_artifact(&self, artifact_id: &str) -> bool {
        self.memory.delete_artifact(artifact_id)
    }
}

impl std::fmt::Debug for ResearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchService")
            .field("config", &self.config)
            .field("artifacts", &self.memory.len())
            .field("session_log", &self.session_log.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::executor::{CompletionFuture, CompletionRequest};
    use crate::memory::ArtifactStatus;
    use crate::prompt::InMemoryTemplates;
    use futures::FutureExt;
    use std::sync::Mutex;

    /// Answers every prompt with `reply-<n>` and remembers the prompts.
    #[derive(Default)]
    struct EchoClient {
        prompts: Mutex<Vec<String>>,
    }

    impl LlmClient for EchoClient {
        fn complete(&self, request: CompletionRequest) -> CompletionFuture<'_> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(request.prompt);
            let reply = format!("reply-{}", prompts.len());
            async move { Ok::<_, ProviderError>(reply) }.boxed()
        }
    }

    const PRIMARY: &str = "\
## Module 1: Foundational Research
Research [Topic/Niche] in [Region].
## Module 2: Audience Segmentation
Segment [Foundational Research Report].
## Module 3: Persona Generation
Personas.
## Module 4: Simulated Inquiry
Interview.
## Module 5: Strategic Synthesis
Synthesize.
";

    const EXTENDED: &str = "\
### Deep Reasoning
Reason about [Your Topic] given [Previous Output].
### Deep Synthesis
Synthesize [Previous Output].
";

    fn service() -> (ResearchService, Arc<EchoClient>) {
        let client = Arc::new(EchoClient::default());
        let service = ResearchService::new(client.clone(), PipelineConfig::default())
            .with_assembler(PromptAssembler::new(
                InMemoryTemplates::new()
                    .with_document(Mode::Primary, PRIMARY)
                    .with_document(Mode::Extended, EXTENDED),
            ));
        (service, client)
    }

    fn dara_input() -> ResearchInput {
        ResearchInput::new()
            .with_mode("dara")
            .with_topic("tea")
            .with_region("Japan")
            .with_notes("first pass")
    }

    #[tokio::test]
    async fn chain_run_records_every_module() {
        let (service, _client) = service();
        let run = service.run_chain(&dara_input()).await.unwrap();

        assert_eq!(run.mode, Mode::Primary);
        assert_eq!(run.results.len(), 5);
        assert_eq!(run.results.completed_count(), 5);

        let artifact = service.get_artifact(&run.artifact_id).unwrap();
        assert_eq!(artifact.current_version, 5);
        assert_eq!(artifact.status, ArtifactStatus::Completed);
        assert_eq!(artifact.metadata.notes, "first pass");
        assert_eq!(artifact.versions[4].module, "strategic_synthesis");

        let report = run.report_metadata();
        assert_eq!(report.mode.as_deref(), Some("dara"));
        assert_eq!(report.topic.as_deref(), Some("tea"));
    }

    #[tokio::test]
    async fn invalid_input_never_starts_a_chain() {
        let (service, client) = service();
        let input = ResearchInput::new().with_mode("dara").with_topic("tea");
        let err = service.run_chain(&input).await.unwrap_err();
        assert!(matches!(err, DiligentError::InputValidation(ref m) if m.contains("region")));

        let err = service
            .run_chain(&ResearchInput::new().with_mode("sideways"))
            .await
            .unwrap_err();
        assert!(matches!(err, DiligentError::UnknownMode(_)));

        assert!(service.list_artifacts().is_empty());
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_module_chains_from_latest_content() {
        let (service, client) = service();
        let id = service.create_session(ArtifactMetadata::new(
            Mode::Primary,
            Some("tea".into()),
            Some("Japan".into()),
        ));
        let input = ResearchInput::new().with_topic("tea").with_region("Japan");

        let first = service
            .run_module(&id, Mode::Primary, "foundational_research", &input)
            .await
            .unwrap();
        assert_eq!(first, "reply-1");
        service
            .run_module(&id, Mode::Primary, "audience_segmentation", &input)
            .await
            .unwrap();

        let prompts = client.prompts.lock().unwrap().clone();
        assert!(prompts[1].contains("Segment reply-1."));
        assert_eq!(service.get_summary(&id).unwrap().total_versions, 2);
    }

    #[tokio::test]
    async fn run_module_errors_are_typed() {
        let (service, _client) = service();
        let input = ResearchInput::new();
        assert!(matches!(
            service
                .run_module("ghost", Mode::Primary, "foundational_research", &input)
                .await,
            Err(DiligentError::ArtifactNotFound(_))
        ));

        let id = service.create_session(ArtifactMetadata::new(Mode::Custom, None, None));
        assert!(matches!(
            service.run_module(&id, Mode::Custom, "bogus", &input).await,
            Err(DiligentError::TemplateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn enhance_appends_prefixed_versions() {
        let (service, client) = service();
        let run = service.run_chain(&dara_input()).await.unwrap();

        let modules = vec!["deep_reasoning".to_string(), "deep_synthesis".to_string()];
        let enhanced = service.enhance(&run.artifact_id, &modules).await.unwrap();
        assert_eq!(enhanced.results.len(), 2);

        let prompts = client.prompts.lock().unwrap().clone();
        assert!(prompts[5].contains("Reason about tea given reply-5."));
        assert!(prompts[6].contains("Synthesize reply-6."));

        let summary = service.get_summary(&run.artifact_id).unwrap();
        assert_eq!(summary.total_versions, 7);
        assert_eq!(summary.modules[5], "didi_deep_reasoning");
        assert_eq!(summary.modules[6], "didi_deep_synthesis");
    }

    #[tokio::test]
    async fn enhance_rejects_unknown_artifact_and_empty_modules() {
        let (service, _client) = service();
        assert!(matches!(
            service.enhance("ghost", &["deep_reasoning".into()]).await,
            Err(DiligentError::ArtifactNotFound(_))
        ));
        let id = service.create_session(ArtifactMetadata::new(Mode::Extended, None, None));
        assert!(matches!(
            service.enhance(&id, &[]).await,
            Err(DiligentError::InputValidation(_))
        ));
    }

    #[tokio::test]
    async fn export_import_delete_through_service() {
        let (service, _client) = service();
        let run = service.run_chain(&dara_input()).await.unwrap();
        let text = service.export_artifact(&run.artifact_id).unwrap();

        assert!(service.delete_artifact(&run.artifact_id));
        assert!(service.get_artifact(&run.artifact_id).is_none());

        let restored = service.import_artifact(&text).unwrap();
        assert_eq!(restored.id, run.artifact_id);
        assert_eq!(restored.versions.len(), 5);
    }

    #[test]
    fn sessions_get_distinct_ids() {
        let (service, _client) = service();
        let a = service.create_session(ArtifactMetadata::new(Mode::Primary, None, None));
        let b = service.create_session(ArtifactMetadata::new(Mode::Primary, None, None));
        assert_ne!(a, b);
        assert_eq!(service.list_artifacts().len(), 2);
    }
}
