//! Word-level edit lists between a ground-truth segment and its match.
//!
//! Words are aligned on their comparison form, so case, punctuation and
//! typographic variants never show up as edits. Edits quote the words as
//! they appear in each text.

use crate::scoring::metrics::lcs_alignment;
use crate::text::{comparison_form, normalize};
use crate::types::Edit;

struct Word<'a> {
    shown: &'a str,
    key: String,
}

fn words(text: &str) -> Vec<Word<'_>> {
    text.split_whitespace()
        .map(|shown| Word {
            shown,
            key: comparison_form(shown),
        })
        .collect()
}

fn quote(words: &[Word<'_>]) -> String {
    let joined = words.iter().map(|w| w.shown).collect::<Vec<_>>().join(" ");
    joined.trim_matches(|c: char| c.is_ascii_punctuation()).to_string()
}

/// Differences going from `ground_truth` to `target`, in text order.
pub fn word_edits(ground_truth: &str, target: &str) -> Vec<Edit> {
    let source = normalize(ground_truth);
    let found = normalize(target);
    let a = words(&source);
    let b = words(&found);

    let keys_a: Vec<&str> = a.iter().map(|w| w.key.as_str()).collect();
    let keys_b: Vec<&str> = b.iter().map(|w| w.key.as_str()).collect();
    let anchors = lcs_alignment(&keys_a, &keys_b);

    let mut edits = Vec::new();
    let (mut i, mut j) = (0, 0);
    for (next_i, next_j) in anchors.into_iter().chain(std::iter::once((a.len(), b.len()))) {
        let removed = &a[i..next_i];
        let inserted = &b[j..next_j];
        let edit = match (removed.is_empty(), inserted.is_empty()) {
            (false, false) => Some(Edit::Changed {
                from: quote(removed),
                to: quote(inserted),
            }),
            (false, true) => Some(Edit::Missing { text: quote(removed) }),
            (true, false) => Some(Edit::Added { text: quote(inserted) }),
            (true, true) => None,
        };
        // Punctuation-only runs carry no words worth reporting
        edits.extend(edit.filter(|e| match e {
            Edit::Missing { text } | Edit::Added { text } => !text.is_empty(),
            Edit::Changed { .. } => true,
        }));
        i = next_i + 1;
        j = next_j + 1;
    }
    edits
}
