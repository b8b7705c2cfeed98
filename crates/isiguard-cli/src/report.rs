//! Human-readable compliance report.

use std::fmt::Write;
use std::path::Path;

use isiguard_core::{Edit, ReasoningSource};
use isiguard_runtime::PipelineOutcome;

pub fn render(outcome: &PipelineOutcome, ground_truth: &Path, document: &Path) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_report(&mut out, outcome, ground_truth, document);
    out
}

fn write_report(
    out: &mut String,
    outcome: &PipelineOutcome,
    ground_truth: &Path,
    document: &Path,
) -> std::fmt::Result {
    writeln!(out, "ISI compliance report")?;
    writeln!(out, "  Ground truth: {}", ground_truth.display())?;
    writeln!(out, "  Document:     {}", document.display())?;
    writeln!(out)?;

    match &outcome.verdict {
        Some(verdict) => {
            let classes: Vec<String> = verdict.severity_classes.iter().map(|c| c.to_string()).collect();
            let source = match verdict.reasoning_source {
                ReasoningSource::Deterministic => "deterministic",
                ReasoningSource::Collaborator => "collaborator",
            };

            writeln!(out, "Composite score:   {:.1}", verdict.composite_score)?;
            writeln!(out, "  Global path:     {:.1}", verdict.per_path_scores.global)?;
            writeln!(out, "  Precision path:  {:.1}", verdict.per_path_scores.precision)?;
            writeln!(out, "  Combine policy:  {}", verdict.combine_policy)?;
            writeln!(out, "Severity:          {}", classes.join(", "))?;
            writeln!(out, "Reasoning:         {}", source)?;
            if verdict.no_candidates_found {
                writeln!(out, "No ISI candidates found in the document.")?;
            }
            writeln!(out)?;

            write_list(out, "Missing content", &verdict.missing_content)?;
            write_list(out, "Extra content", &verdict.extra_content)?;
            write_edits(out, &verdict.edits)?;

            writeln!(out, "Rationale:")?;
            writeln!(out, "  {}", verdict.rationale)?;
            writeln!(out)?;
        }
        None => {
            writeln!(out, "No verdict.")?;
            if let Some(global) = &outcome.global {
                writeln!(out, "  Global path:     {:.1} (partial result)", global.score)?;
            }
            writeln!(out)?;
        }
    }

    if !outcome.degradations.is_empty() {
        writeln!(out, "Degraded ({}):", outcome.degradations.len())?;
        for degradation in &outcome.degradations {
            match degradation.candidate {
                Some(index) => writeln!(
                    out,
                    "  - {} (candidate {}): {}",
                    degradation.stage, index, degradation.reason
                )?,
                None => writeln!(out, "  - {}: {}", degradation.stage, degradation.reason)?,
            }
        }
        writeln!(out)?;
    }

    if let Some(consolidated) = &outcome.consolidated {
        writeln!(out, "Consolidated ISI:")?;
        if consolidated.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for segment in &consolidated.segments {
            writeln!(out, "  {}", segment.text)?;
        }
        writeln!(out)?;
    }

    if outcome.usage.llm_calls > 0 {
        writeln!(
            out,
            "LLM usage: {} calls, {} tokens, ~${:.4}",
            outcome.usage.llm_calls, outcome.usage.total_tokens, outcome.usage.estimated_cost
        )?;
    }
    Ok(())
}

/// Edits shown before the rest are summarized.
const MAX_EDITS_SHOWN: usize = 10;

fn write_edits(out: &mut String, edits: &[Edit]) -> std::fmt::Result {
    if edits.is_empty() {
        return Ok(());
    }
    writeln!(out, "Edits ({}):", edits.len())?;
    for (i, edit) in edits.iter().take(MAX_EDITS_SHOWN).enumerate() {
        writeln!(out, "  {}. {}", i + 1, edit)?;
    }
    if edits.len() > MAX_EDITS_SHOWN {
        writeln!(out, "  ... and {} more.", edits.len() - MAX_EDITS_SHOWN)?;
    }
    writeln!(out)
}

fn write_list(out: &mut String, title: &str, items: &[String]) -> std::fmt::Result {
    if items.is_empty() {
        writeln!(out, "{}: none", title)?;
    } else {
        writeln!(out, "{} ({}):", title, items.len())?;
        for item in items {
            writeln!(out, "  - {}", item)?;
        }
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edits_beyond_ten_are_summarized() {
        let edits: Vec<Edit> = (0..12).map(|i| Edit::Added { text: format!("w{}", i) }).collect();
        let mut out = String::new();
        write_edits(&mut out, &edits).unwrap();

        assert!(out.starts_with("Edits (12):\n"));
        assert!(out.contains("  10. added: 'w9'\n"));
        assert!(!out.contains("'w10'"));
        assert!(out.contains("  ... and 2 more."));
    }

    #[test]
    fn test_no_edits_writes_nothing() {
        let mut out = String::new();
        write_edits(&mut out, &[]).unwrap();
        assert!(out.is_empty());
    }
}
