//! Text normalization for safety-text matching.
//!
//! PDF and OCR output carries artifacts that must not count as textual
//! differences: trademark glyphs, soft hyphens, words broken across lines,
//! typographic dashes and quotes, irregular whitespace. Everything that is
//! compared goes through [`normalize`] first, and every score is computed on
//! the [`comparison_form`] of a text.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::BTreeSet;

lazy_static! {
    static ref TRADEMARKS: Regex = Regex::new(r"[®™©]").unwrap();

    /// C0/C1 control characters except tab, line feed and carriage return.
    static ref CONTROL_CHARS: Regex =
        Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\x9F\u{200B}\u{FEFF}]").unwrap();

    /// A hyphen followed by whitespace inside a word ("hepa-\ntotoxicity").
    /// Letters on both sides, so numeric ranges ("12- 17") are left alone.
    static ref BROKEN_WORD: Regex = Regex::new(r"(\p{L})-\s+(\p{Ll}+)").unwrap();

    static ref DASHES: Regex = Regex::new(r"[\u{2010}-\u{2015}\u{2212}]").unwrap();
    static ref DOUBLE_QUOTES: Regex = Regex::new(r"[\u{201C}\u{201D}\u{201E}\u{00AB}\u{00BB}]").unwrap();
    static ref SINGLE_QUOTES: Regex = Regex::new(r"[\u{2018}\u{2019}\u{201A}\u{2032}]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    static ref WORD: Regex = Regex::new(r"[\w']+").unwrap();

    /// Paragraph boundary: a blank line, or a line that opens with a bullet.
    static ref BLOCK_BREAK: Regex = Regex::new(r"\n\s*\n|\n\s*[•▪◦●■\-\*]\s+").unwrap();
    static ref LEADING_BULLET: Regex = Regex::new(r"^\s*[•▪◦●■\*]\s+").unwrap();
}

/// Abbreviations whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "e.g.", "i.e.", "etc.", "vs.", "dr.", "mr.", "mrs.", "ms.", "no.", "approx.", "inc.", "u.s.",
];

/// Function words that never anchor a match on their own.
const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "been", "before", "being", "below",
    "between", "both", "could", "does", "doing", "down", "during", "each", "from", "further",
    "have", "having", "here", "into", "itself", "just", "more", "most", "other", "over", "same",
    "should", "some", "such", "than", "that", "their", "theirs", "them", "then", "there", "these",
    "they", "this", "those", "through", "under", "until", "very", "what", "when", "where", "which",
    "while", "will", "with", "would", "your", "yours",
];

/// Words that follow a suspended hyphen ("pre- and post-dose").
const SUSPENDED_HYPHEN_JOINERS: &[&str] = &["and", "or", "nor", "to"];

/// Length of the prefix used as a content stem ("pregnant" and "pregnancy" share "pregn").
const STEM_LEN: usize = 5;

/// Normalize raw document text for matching.
///
/// Removes trademark symbols and control characters, joins words broken by a
/// hyphenated line wrap, unifies dashes and quotes, and collapses whitespace.
pub fn normalize(text: &str) -> String {
    let text = TRADEMARKS.replace_all(text, "");
    let text = CONTROL_CHARS.replace_all(&text, "");
    let text = text.replace('\u{00AD}', "-");
    let text = join_broken_words(&text);
    let text = DASHES.replace_all(&text, "-");
    let text = DOUBLE_QUOTES.replace_all(&text, "\"");
    let text = SINGLE_QUOTES.replace_all(&text, "'");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

fn join_broken_words(text: &str) -> Cow<'_, str> {
    BROKEN_WORD.replace_all(text, |caps: &Captures| {
        if SUSPENDED_HYPHEN_JOINERS.contains(&&caps[2]) {
            caps[0].to_string()
        } else {
            format!("{}{}", &caps[1], &caps[2])
        }
    })
}

/// Lowercased word tokens of a text. Punctuation is dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD.find_iter(&normalize(text).to_lowercase())
        .map(|m| m.as_str().trim_matches('\'').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// The form every similarity metric operates on: tokens joined by single spaces.
pub fn comparison_form(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Whether a text carries at least one word token.
pub fn has_words(text: &str) -> bool {
    !tokenize(text).is_empty()
}

/// Split text into normalized sentence-level segments.
///
/// Paragraph boundaries (blank lines, bulleted lines) always split. Inside a
/// paragraph, a word ending in `.`, `!`, `?` or `;` closes a sentence unless
/// it is a known abbreviation. Segments without word tokens are dropped.
pub fn split_segments(text: &str) -> Vec<String> {
    let text = text.replace("\r\n", "\n");
    let text = join_broken_words(&text);

    BLOCK_BREAK
        .split(&text)
        .flat_map(split_sentences)
        .map(|s| normalize(&LEADING_BULLET.replace(&s, "")))
        .filter(|s| has_words(s))
        .collect()
}

fn split_sentences(block: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in block.split_whitespace() {
        current.push(word);
        if ends_sentence(word) {
            sentences.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        sentences.push(current.join(" "));
    }
    sentences
}

fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end_matches(['"', '\'', ')', ']', '\u{201D}', '\u{2019}']);
    let Some(last) = trimmed.chars().last() else {
        return false;
    };
    if !matches!(last, '.' | '!' | '?' | ';') {
        return false;
    }
    !ABBREVIATIONS.contains(&trimmed.to_lowercase().as_str())
}

/// Content stems of a text: five-letter prefixes of its non-stopword tokens
/// of four or more letters.
pub fn content_stems(text: &str) -> BTreeSet<String> {
    stems_of(&tokenize(text))
}

fn stems_of(tokens: &[String]) -> BTreeSet<String> {
    tokens
        .iter()
        .filter(|t| t.chars().count() >= 4 && !t.contains('\'') && !STOPWORDS.contains(&t.as_str()))
        .map(|t| t.chars().take(STEM_LEN).collect())
        .collect()
}

/// Whether two texts share vocabulary beyond function words.
///
/// Texts made only of short or function words are considered anchored, so
/// the decision falls to the similarity score alone.
pub fn shares_content(a: &str, b: &str) -> bool {
    stems_overlap(&content_stems(a), &content_stems(b))
}

fn stems_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    a.is_empty() || b.is_empty() || !a.is_disjoint(b)
}

/// A text tokenized once for repeated comparison.
#[derive(Debug, Clone)]
pub(crate) struct PreparedText {
    pub form: String,
    pub stems: BTreeSet<String>,
}

impl PreparedText {
    pub fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        Self {
            stems: stems_of(&tokens),
            form: tokens.join(" "),
        }
    }

    /// [`shares_content`] on the prepared forms.
    pub fn shares_content(&self, other: &PreparedText) -> bool {
        stems_overlap(&self.stems, &other.stems)
    }
}
