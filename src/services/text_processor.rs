// Text Processing Service
// Whitespace normalization, length clipping and the lexical metrics used by the heuristic scorer

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

fn letter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\p{L}").expect("letter regex"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\p{L}[\p{L}'-]*").expect("word regex"))
}

fn sentence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("sentence regex"))
}

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.,!?;:]").expect("punctuation regex"))
}

/// Trim the text and collapse every whitespace run (spaces, tabs, newlines) into one space
pub fn normalize_whitespace(text: &str) -> String {
    whitespace_re().replace_all(text.trim(), " ").into_owned()
}

/// Clip text to at most `max_chars` Unicode scalar values
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// True when the text contains at least one alphabetic (Unicode letter) character
pub fn has_letter(text: &str) -> bool {
    letter_re().is_match(text)
}

/// Word-like units: a letter followed by letters, apostrophes or hyphens
pub fn words(text: &str) -> Vec<&str> {
    word_re().find_iter(text).map(|m| m.as_str()).collect()
}

/// Lexical shape of a piece of text
#[derive(Debug, Clone, PartialEq)]
pub struct TextMetrics {
    pub word_count: usize,
    /// distinct lowercase words / word count (0 for no words)
    pub unique_ratio: f64,
    /// runs of `.!?`, never below 1
    pub sentence_count: usize,
    pub avg_words_per_sentence: f64,
    /// `.,!?;:` characters over non-whitespace characters
    pub punctuation_ratio: f64,
}

impl TextMetrics {
    pub fn compute(text: &str) -> Self {
        let words = words(text);
        let word_count = words.len();
        let unique: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
        let unique_ratio = if word_count > 0 {
            unique.len() as f64 / word_count as f64
        } else {
            0.0
        };

        let sentence_count = sentence_end_re().find_iter(text).count().max(1);
        let avg_words_per_sentence = word_count as f64 / sentence_count as f64;

        let punctuation = punctuation_re().find_iter(text).count();
        let non_space = text.chars().filter(|c| !c.is_whitespace()).count().max(1);
        let punctuation_ratio = punctuation as f64 / non_space as f64;

        Self {
            word_count,
            unique_ratio,
            sentence_count,
            avg_words_per_sentence,
            punctuation_ratio,
        }
    }

    /// Signal weight for short texts: 0.5 / 0.75 / 0.9 / 1.0 at 8, 12 and 16 words
    pub fn length_factor(&self) -> f64 {
        match self.word_count {
            0..=7 => 0.5,
            8..=11 => 0.75,
            12..=15 => 0.9,
            _ => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  hello \n\n  world\t! "), "hello world !");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_truncate_chars_counts_scalars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_has_letter() {
        assert!(!has_letter("1234 !!! ---"));
        assert!(has_letter("42 é"));
    }

    #[test]
    fn test_metrics_basic() {
        let m = TextMetrics::compute("The cat sat. The cat ran!");
        assert_eq!(m.word_count, 6);
        assert_eq!(m.sentence_count, 2);
        assert!((m.unique_ratio - 4.0 / 6.0).abs() < 1e-9);
        assert!((m.avg_words_per_sentence - 3.0).abs() < 1e-9);
        // 2 punctuation chars over 20 non-space chars
        assert!((m.punctuation_ratio - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_without_terminal_punctuation() {
        let m = TextMetrics::compute("no punctuation here at all");
        assert_eq!(m.sentence_count, 1);
        assert_eq!(m.punctuation_ratio, 0.0);
    }

    #[test]
    fn test_length_factor_steps() {
        let factor = |n: usize| {
            let text = vec!["word"; n].join(" ");
            TextMetrics::compute(&text).length_factor()
        };
        assert_eq!(factor(7), 0.5);
        assert_eq!(factor(8), 0.75);
        assert_eq!(factor(12), 0.9);
        assert_eq!(factor(16), 1.0);
    }
}
