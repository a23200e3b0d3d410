//! Report rendering.
//!
//! Renderers are pure: the same results and metadata always produce the
//! same text. The generation time comes from [`ReportMetadata`], not the
//! clock.

use crate::error::DiligentError;
use crate::executor::{ChainResults, ModuleOutcome};
use crate::memory::Artifact;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Header fields printed above the module sections.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub mode: Option<String>,
    pub topic: Option<String>,
    pub region: Option<String>,
    pub generated: String,
}

/// Output file format for [`write_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
        }
    }

    pub fn render(
        &self,
        results: &ChainResults,
        metadata: &ReportMetadata,
    ) -> Result<String, DiligentError> {
        match self {
            ReportFormat::Markdown => Ok(render_markdown(results, metadata)),
            ReportFormat::Json => render_json(results, metadata),
        }
    }
}

/// A line worth surfacing from a module's output.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Highlight {
    pub module: String,
    pub text: String,
}

const HIGHLIGHT_MARKERS: [&str; 3] = ["Key Finding", "Insight:", "Recommendation:"];

/// `deep_quality_review` → `Deep Quality Review`.
pub fn display_name(module: &str) -> String {
    module
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a Markdown report with one section per module.
pub fn render_markdown(results: &ChainResults, metadata: &ReportMetadata) -> String {
    let or_na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());

    let mut out = String::from("# Deep Diligent Agent Report\n\n");
    if let Some(id) = &metadata.session_id {
        out.push_str(&format!("**Session:** {id}\n"));
    }
    out.push_str(&format!(
        "**Mode:** {}\n",
        metadata.mode.as_deref().unwrap_or("Unknown")
    ));
    out.push_str(&format!("**Topic:** {}\n", or_na(&metadata.topic)));
    out.push_str(&format!("**Region:** {}\n", or_na(&metadata.region)));
    out.push_str(&format!("**Generated:** {}\n\n", metadata.generated));
    out.push_str("---\n\n");

    for result in results {
        out.push_str(&format!("## {}\n\n", display_name(&result.module)));
        match &result.outcome {
            ModuleOutcome::Completed { content } => {
                out.push_str(content.trim_end());
                out.push_str("\n\n");
            }
            ModuleOutcome::Failed { error } => {
                out.push_str(&format!("**Error:** {error}\n\n"));
            }
        }
        out.push_str("---\n\n");
    }

    out
}

/// Render `{metadata, results: [...]}` as pretty JSON.
pub fn render_json(
    results: &ChainResults,
    metadata: &ReportMetadata,
) -> Result<String, DiligentError> {
    let value = json!({
        "metadata": metadata,
        "results": results,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Collect highlight lines from successful module outputs, in result order.
pub fn extract_highlights(results: &ChainResults) -> Vec<Highlight> {
    results
        .iter()
        .filter_map(|r| r.outcome.content().map(|c| (r, c)))
        .flat_map(|(r, content)| {
            content
                .lines()
                .filter(|line| {
                    line.starts_with("- **") || HIGHLIGHT_MARKERS.iter().any(|m| line.contains(m))
                })
                .map(move |line| Highlight {
                    module: r.module.clone(),
                    text: line.trim().to_string(),
                })
        })
        .collect()
}

/// Rebuild chain results from a stored artifact, one entry per version.
/// Versions without text `content` render their raw data as pretty JSON.
pub fn results_from_artifact(artifact: &Artifact) -> ChainResults {
    let mut results = ChainResults::new();
    for version in &artifact.versions {
        let content = match version.data.get("content").and_then(|c| c.as_str()) {
            Some(text) => text.to_string(),
            None => serde_json::to_string_pretty(&version.data).unwrap_or_default(),
        };
        results.push(version.module.clone(), ModuleOutcome::Completed { content });
    }
    results
}

/// Header fields describing a stored artifact.
pub fn metadata_for_artifact(artifact: &Artifact, generated: impl Into<String>) -> ReportMetadata {
    ReportMetadata {
        session_id: Some(artifact.id.clone()),
        mode: Some(artifact.metadata.mode.as_str().to_string()),
        topic: artifact.metadata.topic.clone(),
        region: artifact.metadata.region.clone(),
        generated: generated.into(),
    }
}

/// `<dir>/report_<timestamp>.<ext>`, with a filesystem-safe timestamp.
pub fn default_report_path(dir: &Path, format: ReportFormat) -> PathBuf {
    let ts = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
    dir.join(format!("report_{ts}.{}", format.extension()))
}

/// Write a rendered report, creating parent directories as needed.
pub fn write_report(path: &Path, content: &str) -> Result<(), DiligentError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    tracing::info!("Report saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> ChainResults {
        let mut r = ChainResults::new();
        r.push(
            "foundational_research",
            ModuleOutcome::Completed {
                content: "Market is growing.\n- **Key Finding**: demand up\nplain line".into(),
            },
        );
        r.push(
            "audience_segmentation",
            ModuleOutcome::Failed {
                error: "LLM API HTTP 500: boom".into(),
            },
        );
        r.push(
            "persona_generation",
            ModuleOutcome::Completed {
                content: "Recommendation: target students\n  Insight: price matters".into(),
            },
        );
        r
    }

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            session_id: None,
            mode: Some("dara".into()),
            topic: Some("tea".into()),
            region: None,
            generated: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name("deep_quality_review"), "Deep Quality Review");
        assert_eq!(display_name("deep-looping"), "Deep Looping");
        assert_eq!(display_name("didi_deep_synthesis"), "Didi Deep Synthesis");
        assert_eq!(display_name("x"), "X");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn markdown_has_header_and_sections_in_order() {
        let md = render_markdown(&results(), &metadata());
        assert!(md.starts_with("# Deep Diligent Agent Report\n\n**Mode:** dara\n"));
        assert!(md.contains("**Topic:** tea\n"));
        assert!(md.contains("**Region:** N/A\n"));
        assert!(md.contains("**Generated:** 2026-01-01T00:00:00.000Z"));

        let a = md.find("## Foundational Research").unwrap();
        let b = md.find("## Audience Segmentation").unwrap();
        let c = md.find("## Persona Generation").unwrap();
        assert!(a < b && b < c);
        assert!(md.contains("**Error:** LLM API HTTP 500: boom"));
        assert_eq!(md.matches("---\n\n").count(), 4);
    }

    #[test]
    fn markdown_is_deterministic() {
        assert_eq!(
            render_markdown(&results(), &metadata()),
            render_markdown(&results(), &metadata())
        );
    }

    #[test]
    fn json_results_are_ordered_array() {
        let text = render_json(&results(), &metadata()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["metadata"]["mode"], "dara");
        let arr = value["results"].as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[0]["module"], "foundational_research");
        assert_eq!(arr[0]["status"], "completed");
        assert_eq!(arr[1]["status"], "error");
        assert_eq!(arr[1]["error"], "LLM API HTTP 500: boom");
    }

    #[test]
    fn highlights_skip_failures_and_trim() {
        let highlights = extract_highlights(&results());
        let texts: Vec<&str> = highlights.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "- **Key Finding**: demand up",
                "Recommendation: target students",
                "Insight: price matters",
            ]
        );
        assert_eq!(highlights[0].module, "foundational_research");
        assert_eq!(highlights[2].module, "persona_generation");
    }

    #[test]
    fn report_paths_and_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = default_report_path(&tmp.path().join("nested"), ReportFormat::Json);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("report_") && name.ends_with(".json"));
        assert!(!name.contains(':'));

        write_report(&path, "{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn artifacts_convert_to_results() {
        let memory = crate::memory::ArtifactMemory::new();
        memory.create_artifact(
            "s1",
            crate::memory::ArtifactMetadata::new(
                crate::router::Mode::Extended,
                Some("tea".into()),
                None,
            ),
        );
        memory
            .append_version("s1", "deep_reasoning", json!({"content": "thought"}))
            .unwrap();
        memory.append_version("s1", "scores", json!({"n": 2})).unwrap();
        let artifact = memory.get_artifact("s1").unwrap();

        let results = results_from_artifact(&artifact);
        assert_eq!(results.len(), 2);
        assert_eq!(results.get("deep_reasoning").unwrap().content(), Some("thought"));
        assert!(results.get("scores").unwrap().content().unwrap().contains("\"n\": 2"));

        let meta = metadata_for_artifact(&artifact, "now");
        assert_eq!(meta.session_id.as_deref(), Some("s1"));
        assert_eq!(meta.mode.as_deref(), Some("dd10"));
        let md = render_markdown(&results, &meta);
        assert!(md.contains("**Session:** s1"));
    }

    #[test]
    fn format_dispatches() {
        let md = ReportFormat::Markdown.render(&results(), &metadata()).unwrap();
        assert!(md.starts_with("# Deep Diligent"));
        let js = ReportFormat::Json.render(&results(), &metadata()).unwrap();
        assert!(js.trim_start().starts_with('{'));
        assert_eq!(ReportFormat::default().extension(), "md");
    }
}
