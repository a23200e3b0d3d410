//! Line-oriented Markdown section extraction.
//!
//! A template document is a Markdown file where every module owns one
//! heading. A module's section runs from its heading line up to (not
//! including) the next heading of the same or higher level, or to the end of
//! the document. Headings inside fenced code blocks are ignored.

use crate::router::Mode;

/// Heading that introduces one module's template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionMarker {
    /// Number of leading `#` characters.
    pub level: u8,
    /// Heading text after the `#` run.
    pub title: &'static str,
}

impl SectionMarker {
    const fn new(level: u8, title: &'static str) -> Self {
        Self { level, title }
    }

    /// Render the marker as the heading line it matches, e.g. `## Module 1: …`.
    pub fn heading_line(&self) -> String {
        format!("{} {}", "#".repeat(self.level as usize), self.title)
    }
}

const PRIMARY_MARKERS: [(&str, SectionMarker); 5] = [
    (
        "foundational_research",
        SectionMarker::new(2, "Module 1: Foundational Research"),
    ),
    (
        "audience_segmentation",
        SectionMarker::new(2, "Module 2: Audience Segmentation"),
    ),
    (
        "persona_generation",
        SectionMarker::new(2, "Module 3: Persona Generation"),
    ),
    (
        "simulated_inquiry",
        SectionMarker::new(2, "Module 4: Simulated Inquiry"),
    ),
    (
        "strategic_synthesis",
        SectionMarker::new(2, "Module 5: Strategic Synthesis"),
    ),
];

const EXTENDED_MARKERS: [(&str, SectionMarker); 11] = [
    ("deep_reasoning", SectionMarker::new(3, "Deep Reasoning")),
    (
        "deep_interpretation",
        SectionMarker::new(3, "Deep Interpretation"),
    ),
    ("deep_intelligence", SectionMarker::new(3, "Deep Intelligence")),
    ("deep_storytelling", SectionMarker::new(3, "Deep Storytelling")),
    (
        "deep_quality_review",
        SectionMarker::new(3, "Deep Quality Review"),
    ),
    ("deep_looping", SectionMarker::new(3, "Deep Looping")),
    (
        "deep_signal_detection",
        SectionMarker::new(3, "Deep Signal Detection"),
    ),
    ("deep_synthesis", SectionMarker::new(3, "Deep Synthesis")),
    ("deep_structure", SectionMarker::new(3, "Deep Structure")),
    ("deep_aesthetics", SectionMarker::new(3, "Deep Aesthetics")),
    (
        "deep_research_complete",
        SectionMarker::new(3, "Complete Deep Research Agent"),
    ),
];

/// Look up the heading marker for `module` within a catalog mode's document.
pub fn marker_for(mode: Mode, module: &str) -> Option<SectionMarker> {
    let table: &[(&str, SectionMarker)] = match mode {
        Mode::Primary => &PRIMARY_MARKERS,
        Mode::Extended => &EXTENDED_MARKERS,
        Mode::Custom => &[],
    };
    table
        .iter()
        .find(|(key, _)| *key == module)
        .map(|(_, marker)| *marker)
}

/// Parse a Markdown ATX heading into `(level, title)`.
fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let trimmed = line.trim_end();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = trimmed.trim_start_matches('#');
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    Some((level as u8, rest.trim()))
}

/// A heading title matches when it equals the marker or extends it after a
/// non-alphanumeric boundary (`Deep Looping: iteration` matches
/// `Deep Looping`, `Deep Loopings` does not).
fn title_matches(title: &str, marker: &str) -> bool {
    match title.strip_prefix(marker) {
        Some(rest) => rest.chars().next().is_none_or(|c| !c.is_alphanumeric()),
        None => false,
    }
}

fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

/// Extract the section introduced by `marker`, heading line included.
///
/// Returns `None` when no matching heading exists.
pub fn extract_section(document: &str, marker: &SectionMarker) -> Option<String> {
    let mut in_fence = false;
    let mut collected: Option<Vec<&str>> = None;

    for line in document.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
        }
        let heading = if in_fence || is_fence(line) {
            None
        } else {
            parse_heading(line)
        };

        if let Some(lines) = collected.as_mut() {
            if heading.is_some_and(|(level, _)| level <= marker.level) {
                break;
            }
            lines.push(line);
        } else if let Some((level, title)) = heading
            && level == marker.level
            && title_matches(title, marker.title)
        {
            collected = Some(vec![line]);
        }
    }

    collected.map(|lines| lines.join("\n").trim().to_string())
}
