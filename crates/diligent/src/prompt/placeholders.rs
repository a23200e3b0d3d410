//! Placeholder substitution for module templates.
//!
//! Templates reference caller input and the previous module's output through
//! bracketed tokens such as `[Topic/Niche]` or `[Previous Output]`. Every
//! occurrence of a token is replaced. Tokens whose value is missing stay in
//! the text untouched.

use crate::router::ResearchInput;

/// Tokens replaced with the research topic.
pub const TOPIC_PLACEHOLDERS: [&str; 2] = ["[Topic/Niche]", "[Your Topic]"];

/// Tokens replaced with the geographic region.
pub const REGION_PLACEHOLDERS: [&str; 2] = ["[Geographic Region]", "[Region]"];

/// Tokens replaced with the previous module's output.
pub const PREVIOUS_OUTPUT_PLACEHOLDERS: [&str; 5] = [
    "[Previous Output]",
    "[Foundational Research Report]",
    "[Audience Segments]",
    "[Persona Profiles]",
    "[Simulated Persona Responses]",
];

/// Substitute every recognized placeholder in `template`.
///
/// The template is scanned once, left to right. Injected values are copied
/// verbatim and never rescanned, so a value that itself contains a token
/// (an earlier answer quoting `[Audience Segments]`, say) is left intact.
pub fn inject_variables(
    template: &str,
    input: &ResearchInput,
    previous_output: Option<&str>,
) -> String {
    let mut table: Vec<(&str, &str)> = Vec::new();
    if let Some(topic) = input.topic() {
        table.extend(TOPIC_PLACEHOLDERS.iter().map(|t| (*t, topic)));
    }
    if let Some(region) = input.region() {
        table.extend(REGION_PLACEHOLDERS.iter().map(|t| (*t, region)));
    }
    if let Some(previous) = previous_output.filter(|p| !p.is_empty()) {
        table.extend(PREVIOUS_OUTPUT_PLACEHOLDERS.iter().map(|t| (*t, previous)));
    }
    if table.is_empty() {
        return template.to_string();
    }

    let mut processed = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('[') {
        let (before, from_bracket) = rest.split_at(pos);
        processed.push_str(before);
        let hit = table.iter().find_map(|(token, value)| {
            from_bracket.strip_prefix(*token).map(|after| (*value, after))
        });
        match hit {
            Some((value, after)) => {
                processed.push_str(value);
                rest = after;
            }
            None => {
                processed.push('[');
                rest = from_bracket.strip_prefix('[').unwrap_or_default();
            }
        }
    }
    processed.push_str(rest);
    processed
}
