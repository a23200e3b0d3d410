//! Prompt assembly: template loading, placeholder injection, chaining.
//!
//! The assembler has three layers:
//!
//! 1. **[`TemplateSource`]** returns a mode's whole template document.
//! 2. **[`sections`]** slices one module's section out of that document.
//! 3. **[`PromptAssembler`]** caches extracted sections, injects caller
//!    values and prior output via [`inject_variables`], and joins modules
//!    into a single chain prompt.

pub mod placeholders;
pub mod sections;
pub mod source;

pub use placeholders::inject_variables;
pub use sections::{SectionMarker, extract_section, marker_for};
pub use source::{BuiltinTemplates, DirTemplateSource, InMemoryTemplates, TemplateSource};

use crate::error::TemplateError;
use crate::router::{Mode, ResearchInput};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Separator placed between module prompts in a chain prompt.
pub const MODULE_DELIMITER: &str = "\n\n---\n\n";

/// Loads, caches and fills module templates.
///
/// Extracted sections are cached per `(mode, module)` for the lifetime of the
/// assembler and never invalidated, so the backing source must not change
/// while the process runs.
pub struct PromptAssembler {
    source: Box<dyn TemplateSource>,
    documents: Mutex<HashMap<Mode, String>>,
    templates: Mutex<HashMap<(Mode, String), String>>,
}

impl PromptAssembler {
    pub fn new(source: impl TemplateSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            documents: Mutex::new(HashMap::new()),
            templates: Mutex::new(HashMap::new()),
        }
    }

    /// Assembler backed by the templates compiled into the crate.
    pub fn builtin() -> Self {
        Self::new(BuiltinTemplates)
    }

    /// Resolve which catalog's document holds `module` for a request in
    /// `mode`. Custom requests borrow the owning catalog of each module.
    fn catalog_mode(module: &str, mode: Mode) -> Option<Mode> {
        match mode {
            Mode::Primary | Mode::Extended => Some(mode),
            Mode::Custom => Mode::for_module(module),
        }
    }

    /// The cached document for `mode`, read from the source on first use.
    /// The source is read without holding the cache lock.
    fn document(&self, mode: Mode) -> Result<String, TemplateError> {
        let cached = self
            .documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&mode)
            .cloned();
        if let Some(doc) = cached {
            return Ok(doc);
        }
        let doc = self.source.read_document(mode)?;
        debug!("Loaded template document for {mode} ({} bytes)", doc.len());
        let mut documents = self.documents.lock().unwrap_or_else(|e| e.into_inner());
        Ok(documents.entry(mode).or_insert(doc).clone())
    }

    /// Load the raw template for `module`.
    ///
    /// Returns an explicit [`TemplateError`] when the module is unknown to
    /// the mode, its heading is missing, or the document is unreadable.
    pub fn load_template(&self, module: &str, mode: Mode) -> Result<String, TemplateError> {
        let unknown = || TemplateError::UnknownModule {
            module: module.to_string(),
            mode,
        };
        let catalog = Self::catalog_mode(module, mode).ok_or_else(unknown)?;
        let key = (catalog, module.to_string());

        if let Some(cached) = self
            .templates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(cached.clone());
        }

        let marker = marker_for(catalog, module).ok_or_else(unknown)?;
        let document = self.document(catalog)?;
        let section =
            extract_section(&document, &marker).ok_or_else(|| TemplateError::HeadingNotFound {
                module: module.to_string(),
                heading: marker.heading_line(),
            })?;

        self.templates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, section.clone());
        Ok(section)
    }

    /// Load `module`'s template and fill in its placeholders.
    pub fn module_prompt(
        &self,
        module: &str,
        mode: Mode,
        input: &ResearchInput,
        previous_output: Option<&str>,
    ) -> Result<String, TemplateError> {
        let template = self.load_template(module, mode)?;
        Ok(inject_variables(&template, input, previous_output))
    }

    /// Build one prompt covering every module in `modules`.
    ///
    /// Modules whose template cannot be loaded are skipped with a warning.
    /// The result is empty when no module produced a template.
    pub fn build_chain_prompt(
        &self,
        modules: &[String],
        mode: Mode,
        input: &ResearchInput,
        previous_output: Option<&str>,
    ) -> String {
        let mut prompt = String::new();
        for module in modules {
            match self.module_prompt(module, mode, input, previous_output) {
                Ok(text) => {
                    prompt.push_str(&text);
                    prompt.push_str(MODULE_DELIMITER);
                }
                Err(e) => warn!("Could not load template for {module}: {e}"),
            }
        }
        prompt.trim().to_string()
    }
}

impl std::fmt::Debug for PromptAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .templates
            .lock()
            .map(|t| t.len())
            .unwrap_or_default();
        f.debug_struct("PromptAssembler")
            .field("cached_templates", &cached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, OnceLock, Weak};

    const PRIMARY_DOC: &str = "\
## Module 1: Foundational Research

Study [Topic/Niche] across [Geographic Region].

## Module 2: Audience Segmentation

Segment using [Foundational Research Report].
";

    const EXTENDED_DOC: &str = "\
### Deep Reasoning

Reason about [Your Topic]. Prior: [Previous Output]

### Deep Synthesis

Synthesize.
";

    fn assembler() -> PromptAssembler {
        PromptAssembler::new(
            InMemoryTemplates::new()
                .with_document(Mode::Primary, PRIMARY_DOC)
                .with_document(Mode::Extended, EXTENDED_DOC),
        )
    }

    fn input() -> ResearchInput {
        ResearchInput::new().with_topic("tea").with_region("Japan")
    }

    /// Counts document reads to observe caching.
    struct CountingSource {
        reads: Arc<AtomicUsize>,
    }

    impl TemplateSource for CountingSource {
        fn read_document(&self, _mode: Mode) -> Result<String, TemplateError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(PRIMARY_DOC.to_string())
        }
    }

    /// Reading the Primary document loads an Extended template through the
    /// same assembler, so a read made under the cache lock would deadlock.
    struct ReentrantSource {
        assembler: Arc<OnceLock<Weak<PromptAssembler>>>,
        nested: Arc<AtomicUsize>,
    }

    impl TemplateSource for ReentrantSource {
        fn read_document(&self, mode: Mode) -> Result<String, TemplateError> {
            match mode {
                Mode::Primary => {
                    if let Some(asm) = self.assembler.get().and_then(Weak::upgrade)
                        && asm.load_template("deep_reasoning", Mode::Extended).is_ok()
                    {
                        self.nested.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(PRIMARY_DOC.to_string())
                }
                _ => Ok(EXTENDED_DOC.to_string()),
            }
        }
    }

    #[test]
    fn load_template_extracts_section() {
        let text = assembler()
            .load_template("audience_segmentation", Mode::Primary)
            .unwrap();
        assert_eq!(
            text,
            "## Module 2: Audience Segmentation\n\nSegment using [Foundational Research Report]."
        );
    }

    #[test]
    fn unknown_module_is_reported() {
        let err = assembler()
            .load_template("deep_reasoning", Mode::Primary)
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnknownModule { .. }));
        let err = assembler()
            .load_template("made_up", Mode::Custom)
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnknownModule { mode: Mode::Custom, .. }));
    }

    #[test]
    fn missing_heading_is_reported() {
        let err = assembler()
            .load_template("persona_generation", Mode::Primary)
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::HeadingNotFound {
                module: "persona_generation".into(),
                heading: "## Module 3: Persona Generation".into(),
            }
        );
    }

    #[test]
    fn custom_mode_resolves_owning_catalog() {
        let asm = assembler();
        assert!(asm.load_template("foundational_research", Mode::Custom).is_ok());
        assert!(asm.load_template("deep_synthesis", Mode::Custom).is_ok());
    }

    #[test]
    fn templates_are_cached() {
        let reads = Arc::new(AtomicUsize::new(0));
        let asm = PromptAssembler::new(CountingSource {
            reads: reads.clone(),
        });
        asm.load_template("foundational_research", Mode::Primary).unwrap();
        asm.load_template("foundational_research", Mode::Primary).unwrap();
        asm.load_template("audience_segmentation", Mode::Primary).unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn documents_are_read_outside_the_cache_lock() {
        let slot = Arc::new(OnceLock::new());
        let nested = Arc::new(AtomicUsize::new(0));
        let asm = Arc::new(PromptAssembler::new(ReentrantSource {
            assembler: slot.clone(),
            nested: nested.clone(),
        }));
        slot.set(Arc::downgrade(&asm)).unwrap();

        asm.load_template("foundational_research", Mode::Primary).unwrap();
        assert_eq!(nested.load(Ordering::SeqCst), 1);
        asm.load_template("audience_segmentation", Mode::Primary).unwrap();
        assert_eq!(nested.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn module_prompt_injects_values() {
        let prompt = assembler()
            .module_prompt("deep_reasoning", Mode::Extended, &input(), Some("EARLIER"))
            .unwrap();
        assert!(prompt.contains("Reason about tea. Prior: EARLIER"));
    }

    #[test]
    fn chain_prompt_joins_and_skips_missing() {
        let modules = vec![
            "foundational_research".to_string(),
            "persona_generation".to_string(),
            "audience_segmentation".to_string(),
        ];
        let prompt = assembler().build_chain_prompt(&modules, Mode::Primary, &input(), Some("R1"));
        assert_eq!(prompt.matches("---").count(), 1);
        assert!(prompt.starts_with("## Module 1: Foundational Research"));
        assert!(prompt.contains("Study tea across Japan."));
        assert!(prompt.ends_with("Segment using R1."));
        assert!(!prompt.contains("Persona"));
    }

    #[test]
    fn chain_prompt_empty_when_nothing_loads() {
        let modules = vec!["nope".to_string()];
        assert!(
            assembler()
                .build_chain_prompt(&modules, Mode::Custom, &input(), None)
                .is_empty()
        );
    }
}
