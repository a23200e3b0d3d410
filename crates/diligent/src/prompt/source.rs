//! Where template documents come from.

use crate::error::TemplateError;
use crate::router::Mode;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File name of the Primary template document.
pub const PRIMARY_DOCUMENT: &str = "DARA.md";
/// File name of the Extended template document.
pub const EXTENDED_DOCUMENT: &str = "DeepSpec_Prompt_Library.md";

/// Supplies the full template document for a catalog mode.
///
/// Section extraction happens in [`PromptAssembler`](super::PromptAssembler);
/// sources only return raw text.
pub trait TemplateSource: Send + Sync {
    fn read_document(&self, mode: Mode) -> Result<String, TemplateError>;
}

/// Document file name for a catalog mode. Custom has no document of its own.
pub fn document_name(mode: Mode) -> Option<&'static str> {
    match mode {
        Mode::Primary => Some(PRIMARY_DOCUMENT),
        Mode::Extended => Some(EXTENDED_DOCUMENT),
        Mode::Custom => None,
    }
}

fn no_document(mode: Mode) -> TemplateError {
    TemplateError::Source {
        mode,
        reason: "mode has no template document".into(),
    }
}

/// Reads `DARA.md` and `DeepSpec_Prompt_Library.md` from a directory.
#[derive(Debug, Clone)]
pub struct DirTemplateSource {
    dir: PathBuf,
}

impl DirTemplateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateSource for DirTemplateSource {
    fn read_document(&self, mode: Mode) -> Result<String, TemplateError> {
        let name = document_name(mode).ok_or_else(|| no_document(mode))?;
        let path = self.dir.join(name);
        std::fs::read_to_string(&path).map_err(|e| TemplateError::Source {
            mode,
            reason: format!("{}: {e}", path.display()),
        })
    }
}

/// Templates compiled into the binary from the crate's `templates/` directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl TemplateSource for BuiltinTemplates {
    fn read_document(&self, mode: Mode) -> Result<String, TemplateError> {
        match mode {
            Mode::Primary => Ok(include_str!("../../templates/DARA.md").to_string()),
            Mode::Extended => {
                Ok(include_str!("../../templates/DeepSpec_Prompt_Library.md").to_string())
            }
            Mode::Custom => Err(no_document(mode)),
        }
    }
}

/// Documents held in memory, keyed by mode.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplates {
    documents: HashMap<Mode, String>,
}

impl InMemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, mode: Mode, text: impl Into<String>) -> Self {
        self.documents.insert(mode, text.into());
        self
    }
}

impl TemplateSource for InMemoryTemplates {
    fn read_document(&self, mode: Mode) -> Result<String, TemplateError> {
        self.documents
            .get(&mode)
            .cloned()
            .ok_or_else(|| no_document(mode))
    }
}
