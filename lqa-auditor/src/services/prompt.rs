//! Prompt construction for audit analysis
//!
//! The system prompt lists the dimensions of the audit kind and fixes the JSON
//! block the recovery pipeline looks for. User prompts carry target metadata,
//! a bounded glossary and bounded page text.

use std::fmt::Write as _;

use lqa_common::config::AuditSettings;

use crate::models::{AuditJob, AuditKind};
use crate::types::GlossaryTerm;

/// Appended when page text exceeds `max_content_chars`
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated...]";

/// System prompt for an audit of `kind`
pub fn system_prompt(kind: AuditKind) -> String {
    let dimensions = kind.expected_dimensions();
    let task = match kind {
        AuditKind::Comparison => {
            "Evaluate localized website content against the original source content."
        }
        AuditKind::Standalone => {
            "Assess whether localized website content reads as a quality translation from the stated source language."
        }
        AuditKind::Proficiency => {
            "Assess the target-language proficiency of the website content as a native reader would."
        }
        AuditKind::ImageSet => {
            "Compare the original and localized screenshots and evaluate the localization quality of the visible text."
        }
    };

    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are an expert localization quality auditor with deep knowledge of translation quality \
         assessment, cultural adaptation and industry-specific terminology.\n"
    );
    let _ = writeln!(prompt, "{task}\n");
    let _ = writeln!(prompt, "## Dimensions (score 0-100 each)\n");
    for dimension in dimensions {
        let _ = writeln!(prompt, "- **{}**: {}", dimension, dimension.description());
    }

    let order: Vec<&str> = dimensions.iter().map(|d| d.as_str()).collect();
    let _ = write!(
        prompt,
        r#"
## Output Format

You MUST end your response with a JSON code block containing the audit results:

```json
{{
  "overall_score": <int 0-100>,
  "dimensions": [
    {{
      "dimension": "{first}",
      "score": <int 0-100>,
      "findings": [
        {{"issue": "<description>", "text": "<problematic text>", "suggestion": "<improved version>", "severity": "high|medium|low"}}
      ],
      "good_examples": [
        {{"description": "<why this is well done>", "text": "<well-translated text>"}}
      ],
      "recommendations": ["<actionable recommendation>"]
    }}
  ]
}}
```

IMPORTANT:
- Include ALL {count} dimensions in exact order: {order}
- overall_score = average of all dimension scores
- The JSON must be valid and parseable
"#,
        first = order[0],
        count = order.len(),
        order = order.join(", "),
    );

    prompt
}

/// User prompt for text analysis of the acquired page content
pub fn text_prompt(
    job: &AuditJob,
    content: &str,
    glossary: &[GlossaryTerm],
    settings: &AuditSettings,
) -> String {
    let mut prompt = String::from("Please perform a localization quality assessment of the following content.\n\n");
    push_target(&mut prompt, job);
    push_glossary(&mut prompt, glossary, settings.max_glossary_terms);

    let _ = writeln!(prompt, "\n## Page Content\n");
    prompt.push_str(&truncate_content(content, settings.max_content_chars));
    prompt.push_str("\n\nEnd your response with the JSON code block as specified in the system prompt.\n");
    prompt
}

/// User prompt accompanying a screenshot
pub fn screenshot_prompt(job: &AuditJob, glossary: &[GlossaryTerm], settings: &AuditSettings) -> String {
    let mut prompt = String::from(
        "The attached image is a full-page screenshot of the localized page. Read the visible text \
         and assess its localization quality.\n\n",
    );
    push_target(&mut prompt, job);
    push_glossary(&mut prompt, glossary, settings.max_glossary_terms);
    prompt.push_str("\nEnd your response with the JSON code block as specified in the system prompt.\n");
    prompt
}

/// Cut `content` to `max_chars` characters, marking the cut
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

fn push_target(prompt: &mut String, job: &AuditJob) {
    let target = &job.target;
    let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());

    if let Some(url) = &target.audit_url {
        let _ = writeln!(prompt, "**URL:** {url}");
    }
    if let Some(url) = &target.original_url {
        let _ = writeln!(prompt, "**Original URL:** {url}");
    }
    let _ = writeln!(prompt, "**Source Language:** {}", or_unknown(&target.source_language));
    let _ = writeln!(prompt, "**Target Language:** {}", or_unknown(&target.target_language));
    let _ = writeln!(
        prompt,
        "**Industry:** {}",
        target.industry.as_deref().unwrap_or("General")
    );
}

fn push_glossary(prompt: &mut String, glossary: &[GlossaryTerm], max_terms: usize) {
    if glossary.is_empty() || max_terms == 0 {
        return;
    }

    let _ = writeln!(prompt, "\n## Industry Glossary\n\nUse these terms to validate terminology:");
    for term in glossary.iter().take(max_terms) {
        let _ = write!(prompt, "- \"{}\" -> \"{}\"", term.source_term, term.target_term);
        if let Some(context) = &term.context {
            let _ = write!(prompt, " (context: {context})");
        }
        prompt.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditMode, AuditTarget};

    fn job() -> AuditJob {
        AuditJob::new(
            AuditKind::Standalone,
            AuditMode::Text,
            AuditTarget {
                audit_url: Some("https://example.de".to_string()),
                target_language: Some("de".to_string()),
                ..AuditTarget::default()
            },
        )
    }

    fn term(n: usize) -> GlossaryTerm {
        GlossaryTerm {
            source_term: format!("term{n}"),
            target_term: format!("Begriff{n}"),
            context: None,
        }
    }

    #[test]
    fn system_prompt_lists_kind_dimensions() {
        let standalone = system_prompt(AuditKind::Standalone);
        assert!(standalone.contains("ALL 7 dimensions"));
        assert!(!standalone.contains("CONSISTENCY"));

        let comparison = system_prompt(AuditKind::Comparison);
        assert!(comparison.contains("ALL 8 dimensions"));
        assert!(comparison.contains("**CONSISTENCY**"));
        assert!(comparison.contains("```json"));
    }

    #[test]
    fn glossary_is_capped() {
        let settings = AuditSettings::default();
        let glossary: Vec<GlossaryTerm> = (0..60).map(term).collect();
        let prompt = text_prompt(&job(), "Hallo", &glossary, &settings);
        assert!(prompt.contains("\"term49\""));
        assert!(!prompt.contains("\"term50\""));
    }

    #[test]
    fn content_is_truncated_on_char_boundary() {
        assert_eq!(truncate_content("short", 10), "short");
        let cut = truncate_content("ääääää", 3);
        assert_eq!(cut, format!("äää{TRUNCATION_MARKER}"));
    }

    #[test]
    fn text_prompt_carries_target_metadata() {
        let prompt = text_prompt(&job(), "Willkommen", &[], &AuditSettings::default());
        assert!(prompt.contains("**URL:** https://example.de"));
        assert!(prompt.contains("**Target Language:** de"));
        assert!(prompt.contains("**Source Language:** unknown"));
        assert!(prompt.contains("**Industry:** General"));
        assert!(prompt.contains("Willkommen"));
        assert!(!prompt.contains("Industry Glossary"));
    }
}
