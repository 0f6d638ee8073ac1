//! Write-time content quality heuristics

use super::entry::EntryMetadata;

const SHORT_CONTENT_WORDS: usize = 200;
const LONG_CONTENT_WORDS: usize = 400;

/// Score generated content in `[0.0, 1.0]`
///
/// Starts at 1.0. Content shorter than 200 words loses 0.2 and content
/// longer than 400 words loses 0.1. Naming the company adds 0.1. Mentioning
/// three or more listed skills adds 0.2, one or two adds 0.1.
pub fn quality_score(content: &str, metadata: &EntryMetadata) -> f64 {
    let mut score: f64 = 1.0;

    let words = content.split_whitespace().count();
    if words < SHORT_CONTENT_WORDS {
        score -= 0.2;
    } else if words > LONG_CONTENT_WORDS {
        score -= 0.1;
    }

    let lowered = content.to_lowercase();

    let company = metadata.company.trim().to_lowercase();
    if !company.is_empty() && lowered.contains(&company) {
        score += 0.1;
    }

    let mentioned = metadata
        .skills
        .iter()
        .map(|skill| skill.trim().to_lowercase())
        .filter(|skill| !skill.is_empty() && lowered.contains(skill.as_str()))
        .count();

    if mentioned >= 3 {
        score += 0.2;
    } else if mentioned > 0 {
        score += 0.1;
    }

    score.clamp(0.0, 1.0)
}
