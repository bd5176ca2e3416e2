//! Free-text answer matching
//!
//! Raw answers are normalized into comparison keys, then checked against
//! the question's accepted keys with a length-bounded Damerau-Levenshtein
//! distance. Everything here is pure; an empty key never matches.

/// Articles and conjunctions dropped from normalized keys (en/fr)
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "or", "le", "la", "les", "l", "un", "une", "des", "de", "du",
    "et", "ou",
];

/// Normalize a raw answer into a comparison key: fold diacritics,
/// lowercase, collapse non-alphanumeric runs to single spaces, drop
/// stop words.
pub fn normalize(raw: &str) -> String {
    let mut folded = String::with_capacity(raw.len());
    let mut last_was_space = true;

    for c in raw.chars() {
        for lc in c.to_lowercase() {
            let mut buf = String::new();
            push_folded(lc, &mut buf);
            for fc in buf.chars() {
                if fc.is_alphanumeric() {
                    folded.push(fc);
                    last_was_space = false;
                } else if !last_was_space {
                    folded.push(' ');
                    last_was_space = true;
                }
            }
        }
    }

    folded
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip the accent from common Latin letters; apostrophe variants all
/// end up as separators. Hand-rolled to avoid pulling in a normalization
/// crate for a couple dozen characters.
fn push_folded(c: char, out: &mut String) {
    match c {
        'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => out.push('a'),
        'è' | 'é' | 'ê' | 'ë' => out.push('e'),
        'ì' | 'í' | 'î' | 'ï' => out.push('i'),
        'ò' | 'ó' | 'ô' | 'ö' | 'õ' => out.push('o'),
        'ù' | 'ú' | 'û' | 'ü' => out.push('u'),
        'ý' | 'ÿ' => out.push('y'),
        'ç' => out.push('c'),
        'ñ' => out.push('n'),
        'œ' => out.push_str("oe"),
        'æ' => out.push_str("ae"),
        'ß' => out.push_str("ss"),
        // Combining marks vanish, so decomposed input ("e" + U+0301)
        // folds the same as the precomposed letter
        '\u{0300}'..='\u{036f}' => {}
        '\'' | '\u{2019}' | '\u{02bc}' | '`' | '\u{00b4}' => out.push(' '),
        _ => out.push(c),
    }
}

/// Allowed edit distance for an accepted key of the given length
pub fn edit_budget(len: usize) -> usize {
    match len {
        0..=3 => 0,
        4..=6 => 1,
        7..=10 => 2,
        11..=15 => 3,
        _ => (len * 15 / 100).min(4),
    }
}

/// Check a normalized key against the accepted keys. Exact membership
/// first, then the banded distance per candidate.
pub fn is_match(key: &str, accepted: &[String]) -> bool {
    if key.is_empty() {
        return false;
    }
    if accepted.iter().any(|a| a == key) {
        return true;
    }

    let key_len = key.chars().count();
    accepted.iter().any(|acc| {
        let len = acc.chars().count();
        if len == 0 {
            return false;
        }
        let budget = edit_budget(len);
        if key_len.abs_diff(len) > budget {
            return false;
        }
        within_distance(key, acc, budget)
    })
}

const INF: usize = usize::MAX / 2;

/// Banded Damerau-Levenshtein (optimal string alignment): insertion,
/// deletion, substitution, adjacent transposition. Cells outside the
/// `[i-budget, i+budget]` band stay at infinity, and the sweep aborts as
/// soon as a whole row exceeds the budget.
fn within_distance(a: &str, b: &str, budget: usize) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if budget == 0 {
        return a == b;
    }

    let m = b.len();
    let mut prev2: Vec<usize> = vec![INF; m + 1];
    let mut prev: Vec<usize> = (0..=m)
        .map(|j| if j <= budget { j } else { INF })
        .collect();

    for i in 1..=a.len() {
        let mut cur = vec![INF; m + 1];
        if i <= budget {
            cur[0] = i;
        }

        let lo = i.saturating_sub(budget).max(1);
        let hi = (i + budget).min(m);
        let mut row_min = cur[0];

        for j in lo..=hi {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut d = (prev[j] + 1)
                .min(cur[j - 1] + 1)
                .min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                d = d.min(prev2[j - 2] + 1);
            }
            cur[j] = d;
            row_min = row_min.min(d);
        }

        if row_min > budget {
            return false;
        }
        prev2 = prev;
        prev = cur;
    }

    prev[m] <= budget
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| normalize(s)).collect()
    }

    #[test]
    fn test_normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize("  L'Été, enfin!  "), "ete enfin");
        assert_eq!(normalize("The Lord of the Rings"), "lord rings");
        assert_eq!(normalize("don’t"), "don t");
    }

    #[test]
    fn test_decomposed_accents_fold_like_precomposed() {
        assert_eq!(normalize("pe\u{301}rou"), "perou");
        assert_eq!(normalize("pe\u{301}rou"), normalize("pérou"));
        assert!(is_match(&normalize("Pe\u{301}rou"), &accepted(&["Pérou"])));
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   !!! ..."), "");
        assert_eq!(normalize("the of and"), "");
    }

    #[test]
    fn test_empty_key_never_matches() {
        assert!(!is_match("", &accepted(&["paris"])));
        assert!(!is_match("paris", &[String::new()]));
    }

    #[test]
    fn test_edit_budget_brackets() {
        assert_eq!(edit_budget(3), 0);
        assert_eq!(edit_budget(5), 1);
        assert_eq!(edit_budget(8), 2);
        assert_eq!(edit_budget(12), 3);
        assert_eq!(edit_budget(20), 3);
        assert_eq!(edit_budget(30), 4);
    }

    #[test]
    fn test_exact_match_fast_path() {
        assert!(is_match("paris", &accepted(&["Paris"])));
    }

    #[test]
    fn test_budget_one_for_paris() {
        let acc = accepted(&["paris"]);
        assert!(is_match("paris", &acc));
        assert!(is_match("pariss", &acc)); // 1 insertion
        assert!(!is_match("parizz", &acc)); // 2 edits
    }

    #[test]
    fn test_transposition_counts_as_one_edit() {
        assert!(is_match("pairs", &accepted(&["paris"])));
    }

    #[test]
    fn test_short_keys_require_exact() {
        let acc = accepted(&["ron"]);
        assert!(is_match("ron", &acc));
        assert!(!is_match("don", &acc));
    }

    #[test]
    fn test_length_prefilter_rejects_cheaply() {
        // Off by 3 in length against a budget of 1
        assert!(!is_match("parisabc", &accepted(&["paris"])));
    }

    #[test]
    fn test_any_candidate_may_match() {
        let acc = accepted(&["new york", "the big apple"]);
        assert!(is_match("big apple", &acc));
        assert!(is_match(&normalize("New-York"), &acc));
    }

    #[test]
    fn test_long_answer_budget() {
        // "arnold schwarzenegger" normalizes to 20 chars incl space, budget 3
        let acc = accepted(&["Arnold Schwarzenegger"]);
        assert!(is_match("arnold schwarzeneger", &acc));
        assert!(!is_match("arnold swartzeneger", &acc));
    }
}
