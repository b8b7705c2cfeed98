//! The five similarity metrics.
//!
//! Every function takes two comparison forms (lowercased tokens joined by
//! single spaces, see [`crate::text::comparison_form`]) and returns a score
//! in `[0, 100]`. An empty side always scores 0.

use std::collections::BTreeSet;

/// Indel similarity of two character sequences: `2 * LCS / (|a| + |b|)`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    sequence_ratio(&a, &b)
}

fn sequence_ratio<T: PartialEq>(a: &[T], b: &[T]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let lcs = longest_common_subsequence(a, b);
    100.0 * (2 * lcs) as f64 / (a.len() + b.len()) as f64
}

/// Lengths of the common prefix and the common suffix of two sequences.
/// The two never overlap.
fn common_affixes<T: PartialEq>(a: &[T], b: &[T]) -> (usize, usize) {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    (prefix, suffix)
}

fn longest_common_subsequence<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    // A shared prefix or suffix is always part of some LCS.
    let (prefix, suffix) = common_affixes(a, b);
    let a = &a[prefix..a.len() - suffix];
    let b = &b[prefix..b.len() - suffix];

    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];

    for x in a {
        for (j, y) in b.iter().enumerate() {
            cur[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prefix + suffix + prev[b.len()]
}

/// Index pairs `(i, j)` with `a[i] == b[j]` forming one longest common
/// subsequence, in increasing order.
pub(crate) fn lcs_alignment<T: PartialEq>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    // table[i][j]: LCS length of a[i..] and b[j..]
    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if a[i] == b[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(table[0][0]);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

/// Token-set similarity. Ignores duplicates and order; a text whose tokens
/// are a subset of the other's scores 100.
pub fn token_set(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let join = |set: BTreeSet<&str>| set.into_iter().collect::<Vec<_>>().join(" ");
    let intersection = join(tokens_a.intersection(&tokens_b).copied().collect());
    let only_a = join(tokens_a.difference(&tokens_b).copied().collect());
    let only_b = join(tokens_b.difference(&tokens_a).copied().collect());

    if !intersection.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let combine = |diff: &str| {
        if intersection.is_empty() {
            diff.to_string()
        } else {
            format!("{} {}", intersection, diff)
        }
    };
    let with_a = combine(&only_a);
    let with_b = combine(&only_b);

    ratio(&intersection, &with_a)
        .max(ratio(&intersection, &with_b))
        .max(ratio(&with_a, &with_b))
}

/// Order-sensitive alignment: LCS ratio over tokens.
pub fn sequence(a: &str, b: &str) -> f64 {
    let tokens_a: Vec<&str> = a.split_whitespace().collect();
    let tokens_b: Vec<&str> = b.split_whitespace().collect();
    sequence_ratio(&tokens_a, &tokens_b)
}

/// Order-insensitive similarity: indel ratio of the sorted token strings.
pub fn token_sort(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Substring similarity: the shorter text aligned against its best-matching
/// stretch of the longer one. A verbatim substring scores 100.
pub fn partial(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(b) || b.contains(a) {
        return 100.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0.0;
    }

    let distance = best_substring_distance(&short, &long);
    (100.0 * (1.0 - distance as f64 / (2 * short.len()) as f64)).max(0.0)
}

/// Smallest indel distance between `short` and any substring of `long`.
fn best_substring_distance(short: &[char], long: &[char]) -> usize {
    // Row 0 is all zeros: the match may start anywhere in `long`.
    let mut prev = vec![0usize; long.len() + 1];
    let mut cur = vec![0usize; long.len() + 1];

    for (i, s) in short.iter().enumerate() {
        cur[0] = i + 1;
        for (j, l) in long.iter().enumerate() {
            cur[j + 1] = if s == l {
                prev[j]
            } else {
                (prev[j + 1] + 1).min(cur[j] + 1)
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev.into_iter().min().unwrap_or(0)
}

/// Character similarity from normalized Levenshtein distance.
pub fn char_edit(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    100.0 * strsim::normalized_levenshtein(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_identical_and_disjoint() {
        assert_eq!(ratio("abc", "abc"), 100.0);
        assert_eq!(ratio("abc", "xyz"), 0.0);
        assert_eq!(ratio("", "abc"), 0.0);
    }

    #[test]
    fn test_ratio_partial_overlap() {
        // LCS("abcd", "abed") = 3 -> 2*3/8
        assert!((ratio("abcd", "abed") - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_lcs_with_shared_affixes() {
        let a: Vec<char> = "consult your doctor today".chars().collect();
        let b: Vec<char> = "consult a doctor today".chars().collect();
        // "consult " and " doctor today" around "your"/"a", which share nothing
        assert_eq!(longest_common_subsequence(&a, &b), 21);
        assert_eq!(longest_common_subsequence(&a, &a), a.len());
        assert_eq!(longest_common_subsequence::<char>(&[], &a), 0);
    }

    #[test]
    fn test_lcs_alignment_pairs() {
        let a = ["do", "not", "take", "if", "pregnant"];
        let b = ["do", "not", "take", "if"];
        assert_eq!(lcs_alignment(&a, &b), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);

        let a = ["consult", "your", "doctor"];
        let b = ["consult", "your", "pharmacist"];
        assert_eq!(lcs_alignment(&a, &b), vec![(0, 0), (1, 1)]);
        assert!(lcs_alignment::<&str>(&[], &b).is_empty());
    }

    #[test]
    fn test_token_set_subset_is_full_match() {
        assert_eq!(token_set("consult your doctor", "please consult your doctor today"), 100.0);
        assert_eq!(token_set("doctor your consult", "consult your doctor"), 100.0);
    }

    #[test]
    fn test_token_set_disjoint_uses_char_ratio() {
        let score = token_set("take pregnant", "store cool");
        assert!(score < 50.0);
    }

    #[test]
    fn test_sequence_is_order_sensitive() {
        assert_eq!(sequence("a b c", "a b c"), 100.0);
        // LCS of [a,b,c] and [c,b,a] is 1 token
        assert!((sequence("a b c", "c b a") - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_token_sort_ignores_order() {
        assert_eq!(token_sort("keep away store cool", "store cool keep away"), 100.0);
    }

    #[test]
    fn test_partial_substring_scores_full() {
        assert_eq!(partial("your doctor", "consult your doctor now"), 100.0);
        assert_eq!(partial("consult your doctor now", "your doctor"), 100.0);
    }

    #[test]
    fn test_partial_one_edit() {
        // "doctar" vs best window "doctor": substitution = 2 indels over 12
        let score = partial("doctar", "ask your doctor");
        assert!((score - (100.0 * (1.0 - 2.0 / 12.0))).abs() < 1e-9);
    }

    #[test]
    fn test_char_edit() {
        assert_eq!(char_edit("kitten", "kitten"), 100.0);
        // Levenshtein("kitten", "sitting") = 3, max len 7
        assert!((char_edit("kitten", "sitting") - 100.0 * (1.0 - 3.0 / 7.0)).abs() < 1e-9);
        assert_eq!(char_edit("", "x"), 0.0);
    }

    #[test]
    fn test_all_metrics_zero_on_empty() {
        let metrics: [fn(&str, &str) -> f64; 5] = [token_set, sequence, token_sort, partial, char_edit];
        for f in metrics {
            assert_eq!(f("", "some text"), 0.0);
            assert_eq!(f("some text", ""), 0.0);
        }
    }
}
