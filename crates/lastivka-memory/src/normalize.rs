//! Text normalization, tokenization, and light Ukrainian stemming.
//!
//! Every function here is total: any input, including the empty string,
//! produces a value, and the same input always produces the same value.

/// Inflection endings, longest first so the longest match wins.
const SUFFIXES: [&str; 24] = [
    "ями", "ами", "ові", "еві", //
    "ах", "ях", "ів", "їв", "ей", "ій", "ам", "ям", "ою", "ею", "ом", "ем", //
    "у", "ю", "і", "ї", "я", "а", "о", "е",
];

/// A stem must keep at least this many characters.
const MIN_STEM_CHARS: usize = 2;

/// Tokens shorter than this are dropped.
const MIN_TOKEN_CHARS: usize = 2;

fn is_text_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || ('а'..='щ').contains(&c)
        || ('А'..='Щ').contains(&c)
        || matches!(
            c,
            'Ь' | 'ь' | 'Ю' | 'ю' | 'Я' | 'я' | 'І' | 'і' | 'Ї' | 'ї' | 'Є' | 'є' | 'Ґ' | 'ґ' | '\''
        )
}

fn strip_suffix(word: &str) -> Option<&str> {
    let len = word.chars().count();
    SUFFIXES
        .iter()
        .find(|suffix| word.ends_with(*suffix) && len >= suffix.chars().count() + MIN_STEM_CHARS)
        .map(|suffix| &word[..word.len() - suffix.len()])
}

/// Strip one recognized suffix from `token`.
///
/// A token starting with a capital letter is treated as a proper noun and
/// left unstemmed (only lower-cased).
pub fn stem(token: &str) -> String {
    let token = token.trim();
    let proper_noun = token.chars().next().is_some_and(char::is_uppercase);
    let word = token.to_lowercase().replace('’', "'");
    if proper_noun {
        return word;
    }
    match strip_suffix(&word) {
        Some(stemmed) => stemmed.to_string(),
        None => word,
    }
}

/// Canonical topic string: lower-cased, whitespace collapsed, stemmed.
///
/// Suffixes are stripped until none applies, so the result is a fixed point:
/// `normalize_key(&normalize_key(x)) == normalize_key(x)`.
pub fn normalize_key(raw: &str) -> String {
    let lowered = raw.to_lowercase().replace('’', "'");
    let mut key = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    while let Some(stripped) = strip_suffix(&key) {
        key = stripped.trim_end().to_string();
    }
    key
}

/// Canonical free text: lower-cased, with every run of characters outside
/// the kept alphabet replaced by one space.
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_gap = false;
    for c in raw.to_lowercase().chars() {
        if is_text_char(c) || c.is_whitespace() {
            out.push(c);
            in_gap = false;
        } else if !in_gap {
            out.push(' ');
            in_gap = true;
        }
    }
    out.trim().to_string()
}

/// Split normalized text into tokens of at least two characters.
pub fn tokenize(raw: &str) -> Vec<String> {
    normalize_text(raw)
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// At most `limit` leading characters of `s`.
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Matching-blocks similarity ratio `2M / (|a| + |b|)` in `[0, 1]`.
///
/// `M` counts characters in the longest common substring, found
/// recursively on both sides of each match (Ratcliff/Obershelp).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut matched = 0usize;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(&a, &b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    2.0 * matched as f64 / total as f64
}

/// Longest common run of `a[alo..ahi]` and `b[blo..bhi]`, earliest in `a`
/// then earliest in `b` on ties.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];
    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            if a[i] == b[j] {
                let run = prev[col - 1] + 1;
                cur[col] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            } else {
                cur[col] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

/// True when `a` and `b` are equal or one edit apart: a single insertion,
/// deletion, substitution, or swap of two adjacent characters.
pub fn within_one_edit(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > 1 {
        return false;
    }

    if a.len() == b.len() {
        let diffs: Vec<usize> = (0..a.len()).filter(|&i| a[i] != b[i]).collect();
        return match diffs.as_slice() {
            [_] => true,
            [first, second] => {
                *second == first + 1 && a[*first] == b[*second] && a[*second] == b[*first]
            }
            _ => false,
        };
    }

    let (long, short) = if a.len() > b.len() { (a, b) } else { (b, a) };
    let mut skipped = false;
    let (mut i, mut j) = (0, 0);
    while i < long.len() && j < short.len() {
        if long[i] == short[j] {
            j += 1;
        } else if skipped {
            return false;
        } else {
            skipped = true;
        }
        i += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_strips_longest_suffix() {
        assert_eq!(stem("кавами"), "кав");
        assert_eq!(stem("кава"), "кав");
        assert_eq!(stem("лісові"), "ліс");
        assert_eq!(stem("водою"), "вод");
    }

    #[test]
    fn stem_keeps_two_characters() {
        assert_eq!(stem("мама"), "мам");
        assert_eq!(stem("ям"), "ям");
        assert_eq!(stem("зоя"), "зо");
        assert_eq!(stem("а"), "а");
        assert_eq!(stem(""), "");
    }

    #[test]
    fn stem_leaves_proper_nouns() {
        assert_eq!(stem("Ластівка"), "ластівка");
        assert_eq!(stem("ластівка"), "ластівк");
    }

    #[test]
    fn normalize_key_collapses_whitespace_and_stems() {
        assert_eq!(normalize_key("  Кава  "), "кав");
        assert_eq!(normalize_key("чорна   кава"), "чорна кав");
        assert_eq!(normalize_key("Марта’s"), "марта's");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn normalize_key_is_idempotent() {
        let samples = [
            "кава", "мамаа", "кава у", "Ластівка", "купити кави", "  ", "x", "борщами",
            "Що я тобі казав?", "manual/notes", "ії", "ая", "ооо", "ям я",
        ];
        for sample in samples {
            let once = normalize_key(sample);
            assert_eq!(normalize_key(&once), once, "input {sample:?}");
        }
    }

    #[test]
    fn normalize_text_replaces_foreign_characters() {
        assert_eq!(normalize_text("Що купити?!"), "що купити");
        assert_eq!(normalize_text("a!!b"), "a b");
        assert_eq!(normalize_text("п'ять"), "п'ять");
        assert_eq!(normalize_text("ёжик"), "жик");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn tokenize_drops_single_characters() {
        assert_eq!(tokenize("я купив 2 кави, і чай"), vec!["купив", "кави", "чай"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize("! ? .").is_empty());
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_chars("кавун", 3), "кав");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }

    #[test]
    fn similarity_matches_block_ratio() {
        assert!((similarity("abcd", "bcde") - 0.75).abs() < 1e-9);
        assert!((similarity("кав", "купити кави") - 6.0 / 14.0).abs() < 1e-9);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        assert_eq!(similarity("same", "same"), 1.0);
    }

    #[test]
    fn one_edit_distance() {
        assert!(within_one_edit("кава", "кава"));
        assert!(within_one_edit("кава", "кавa"));
        assert!(within_one_edit("кава", "ава"));
        assert!(within_one_edit("кав", "кава"));
        assert!(within_one_edit("абв", "бав"));
        assert!(!within_one_edit("абвг", "бавд"));
        assert!(!within_one_edit("кава", "кк"));
        assert!(!within_one_edit("abcd", "badc"));
    }
}
