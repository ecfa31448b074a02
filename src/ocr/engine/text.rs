use regex::Regex;
use std::sync::LazyLock;

static NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^A-Za-z0-9ÁÉÍÓÚÜÑáéíóúüñ]+$").expect("noise regex"));

/// Text made only of symbols, with no latin letter or digit at all.
pub(crate) fn is_symbol_noise(text: &str) -> bool {
    NOISE_RE.is_match(text)
}

/// One character repeated four or more times ("....", "AAAA").
pub(crate) fn is_repeated_char(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let mut count = 1usize;
    for ch in chars {
        if ch != first {
            return false;
        }
        count += 1;
    }
    count >= 4
}

/// Fraction of characters (whitespace included) matching the predicate.
pub(crate) fn char_ratio(text: &str, predicate: impl Fn(char) -> bool) -> f32 {
    let mut total = 0usize;
    let mut hits = 0usize;
    for ch in text.chars() {
        total += 1;
        if predicate(ch) {
            hits += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        hits as f32 / total as f32
    }
}

pub(crate) fn non_alnum_ratio(text: &str) -> f32 {
    char_ratio(text, |ch| !ch.is_alphanumeric())
}

/// Has at least one cased letter and no lowercase letter.
pub(crate) fn is_upper_text(text: &str) -> bool {
    text.chars().any(|ch| ch.is_uppercase()) && !text.chars().any(|ch| ch.is_lowercase())
}

pub(crate) fn has_lowercase(text: &str) -> bool {
    text.chars().any(|ch| ch.is_lowercase())
}

/// Space-joins trimmed fragments, skipping empty ones.
pub(super) fn join_fragments<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let texts: Vec<&str> = fragments.into_iter().map(str::trim).collect();
    let joined = texts
        .iter()
        .filter(|text| !text.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        texts.first().map(|text| text.to_string()).unwrap_or_default()
    } else {
        joined
    }
}

/// Confidence averaged with the trimmed text length as weight; missing scores count as 1.0.
pub(super) fn weighted_confidence<'a, I>(parts: I) -> Option<f32>
where
    I: IntoIterator<Item = (&'a str, Option<f32>)>,
{
    let mut weighted = 0.0f32;
    let mut total = 0usize;
    for (text, conf) in parts {
        let weight = text.trim().chars().count().max(1);
        weighted += conf.unwrap_or(1.0) * weight as f32;
        total += weight;
    }
    if total == 0 {
        None
    } else {
        Some(weighted / total as f32)
    }
}
