// Heuristic Scorer
// Deterministic, offline AI-likelihood scoring for short social texts
//
// Signals are accumulated as a positive score (AI-ish phrasing, topics, structure)
// and a negative score (casual/social markers), combined, amplified when families
// co-occur, then shaped by a power curve and a two-segment calibration.

use super::text_processor::{has_letter, normalize_whitespace, TextMetrics};
use regex::Regex;
use std::sync::OnceLock;

pub const HEURISTIC_SCORE_POWER: f64 = 1.2;
/// Best raw threshold from offline benchmarking; remapped so it displays as 75
pub const CALIBRATION_ANCHOR_RAW: f64 = 19.0;
pub const CALIBRATION_ANCHOR_MAPPED: f64 = 75.0;

const STRONG_PATTERNS: &[&str] = &[
    r"as an ai language model",
    r"as a language model",
    r"i(?:'m| am) unable to",
    r"i cannot assist",
    r"i (?:cannot|can't|do not|don't) (?:access|provide|help)",
    r"i don't have (?:access|browsing)",
];

const WEAK_PATTERNS: &[&str] = &[
    r"as an ai\b",
    r"delve into",
    r"it is important to note",
    r"it(?:'s| is) worth noting",
    r"in conclusion",
    r"in today's world",
    r"overall",
    r"furthermore",
    r"moreover",
    r"this highlights",
    r"this (?:suggests|indicates) that",
    r"let's (?:explore|break down|take a look)",
    r"there are (?:several|multiple) (?:ways|factors)",
    r"additionally",
    r"as such",
    r"in summary",
];

const FORMAL_MARKERS: &[&str] = &[r"therefore", r"consequently", r"nevertheless"];

const STRUCTURE_MARKERS: &[&str] = &[
    r"\bfirst(?:ly)?\b",
    r"\bsecond(?:ly)?\b",
    r"\bthird(?:ly)?\b",
    r"\bon the (?:one|other) hand\b",
];

const TOPIC_PATTERNS: &[&str] = &[
    r"\bartificial intelligence\b",
    r"\bai\b",
    r"\bmachine learning\b",
    r"\bdeep learning\b",
    r"\bneural network(?:s)?\b",
    r"\brobot(?:s|ics)?\b",
    r"\bchatbot(?:s)?\b",
    r"\bautonomous\b",
    r"\bnlp\b",
    r"\bdata\b",
    r"\bautomation\b",
    r"\balgorithm(?:s)?\b",
    r"\btransform(?:ing|s|ed)?\b",
    r"\brevolutioniz(?:ing|es|ed)?\b",
    r"\bcybersecurity\b",
    r"\bquantum\b",
    r"\bethical\b",
    r"\bethics\b",
    r"\bresponsible\b",
    r"\bmodel(?:s)?\b",
    r"\bmarket(?:s)?\b",
    r"\bfinancial\b",
    r"\bfinance\b",
    r"\beconom(?:y|ic)\b",
    r"\binvest(?:ment|ing|or)s?\b",
    r"\bportfolio(?:s)?\b",
    r"\bstock(?:s)?\b",
    r"\bstock market\b",
    r"\bearnings\b",
    r"\btrading\b",
    r"\btrader(?:s)?\b",
    r"\bcrypto(?:currency|currencies)?\b",
    r"\bbitcoin\b",
    r"\bblockchain\b",
    r"\bdiversif(?:y|ying|ication)\b",
    r"\bhedge\b",
    r"\bfund(?:s)?\b",
    r"\bbullish\b",
    r"\bbearish\b",
    r"\banalyst(?:s)?\b",
    r"\banalysis\b",
    r"\bsector\b",
    r"\boil\b",
    r"\bprice(?:s)?\b",
    r"\bgrowth\b",
    r"\bglobal\b",
    r"\bindustr(?:y|ies)\b",
    r"\bquarter\b",
    r"\boutlook\b",
    r"\bcurrenc(?:y|ies)\b",
    r"\bfiscal\b",
    r"\bpolicy\b",
    r"\bpolicies\b",
    r"\bfed\b",
    r"\btrade\b",
];

const SOFT_TOPIC_PATTERNS: &[&str] = &[
    r"\bcomputer science\b",
    r"\bcoding\b",
    r"\bprogramming\b",
    r"\bsoftware\b",
    r"\bdeveloper(?:s)?\b",
    r"\bengineer(?:s)?\b",
    r"\binnovat(?:ion|ive|e|es|ed|ing)?\b",
    r"\btechnology\b",
    r"\bdigital\b",
];

const CORE_TOPIC_PATTERNS: &[&str] = &[
    r"\bartificial intelligence\b",
    r"\bai\b",
    r"\bmachine learning\b",
    r"\bdeep learning\b",
    r"\bneural network(?:s)?\b",
    r"\bchatbot(?:s)?\b",
    r"\bnlp\b",
    r"\bdata\b",
    r"\balgorithm(?:s)?\b",
    r"\bautomation\b",
    r"\bcybersecurity\b",
    r"\bquantum\b",
    r"\bcrypto(?:currency|currencies)?\b",
    r"\bbitcoin\b",
    r"\bblockchain\b",
    r"\bstock(?:s)?\b",
    r"\bstock market\b",
    r"\bearnings\b",
    r"\binvest(?:ment|ing|or)s?\b",
    r"\bportfolio(?:s)?\b",
    r"\bfinancial\b",
    r"\bfinance\b",
    r"\bmarket(?:s)?\b",
    r"\btrading\b",
    r"\btrader(?:s)?\b",
    r"\bhedge\b",
    r"\bfund(?:s)?\b",
    r"\bbullish\b",
    r"\bbearish\b",
];

const CASUAL_PATTERNS: &[&str] = &[
    r"\b(lol|lmao|rofl|omg|idk|imo|imho|btw|tbh)\b",
    r"\b(haha|hehe)\b",
];

/// Word boundaries look at ASCII word characters only, so Latin words glued to
/// CJK text or accented letters still match
fn ascii_boundaries(pattern: &str) -> String {
    pattern.replace(r"\b", r"(?-u:\b)")
}

/// Case-insensitive pattern family; counts are summed over every pattern
struct PatternSet(Vec<Regex>);

impl PatternSet {
    fn compile(patterns: &[&str]) -> Self {
        Self(
            patterns
                .iter()
                .map(|p| {
                    Regex::new(&format!("(?i){}", ascii_boundaries(p))).expect("heuristic pattern")
                })
                .collect(),
        )
    }

    fn count(&self, text: &str) -> usize {
        self.0.iter().map(|re| re.find_iter(text).count()).sum()
    }
}

macro_rules! pattern_set {
    ($name:ident, $patterns:expr) => {
        fn $name() -> &'static PatternSet {
            static SET: OnceLock<PatternSet> = OnceLock::new();
            SET.get_or_init(|| PatternSet::compile($patterns))
        }
    };
}

pattern_set!(strong_set, STRONG_PATTERNS);
pattern_set!(weak_set, WEAK_PATTERNS);
pattern_set!(formal_set, FORMAL_MARKERS);
pattern_set!(structure_set, STRUCTURE_MARKERS);
pattern_set!(topic_set, TOPIC_PATTERNS);
pattern_set!(soft_topic_set, SOFT_TOPIC_PATTERNS);
pattern_set!(core_topic_set, CORE_TOPIC_PATTERNS);
pattern_set!(casual_set, CASUAL_PATTERNS);

macro_rules! lazy_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new(&ascii_boundaries($pattern)).expect(stringify!($name)))
        }
    };
}

lazy_regex!(ticker_re, r"\$[A-Z]{2,5}\b");
lazy_regex!(url_re, r"(?i)https?://\S+");
lazy_regex!(www_re, r"(?i)\bwww\.\S+");
lazy_regex!(bare_url_re, r"(?i)\b[a-z0-9.-]+\.[a-z]{2,6}(?:/\S*)?");
lazy_regex!(mention_re, r"(^|[^A-Za-z0-9_.])@([A-Za-z0-9_]{1,15})");
lazy_regex!(hashtag_re, r"(^|[^A-Za-z0-9_])#([A-Za-z0-9_]{1,50})");
lazy_regex!(contraction_re, r"(?i)\b[a-z0-9_]+'(?:t|s|re|ve|d|ll)\b");
lazy_regex!(emoji_re, r"[\x{1F1E6}-\x{1FAFF}\x{2600}-\x{27BF}\x{FE0F}]");
lazy_regex!(list_item_re, r"(?:^|[\n\r]|\s)([0-9]+)\.\s+\S+");
lazy_regex!(repeated_marks_re, r"[!?]{2,}");

/// Clamp to 0..=100 and round half up; non-finite input scores 0
pub fn normalize_score(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    score.round().clamp(0.0, 100.0) as u8
}

/// `round(100 * (score/100)^power)`; compresses low scores, keeps 0 and 100 fixed
pub fn apply_heuristic_curve(score: f64, power: f64) -> u8 {
    let normalized = normalize_score(score) as f64;
    let power = if power.is_finite() && power > 0.0 {
        power
    } else {
        HEURISTIC_SCORE_POWER
    };
    normalize_score((normalized / 100.0).powf(power) * 100.0)
}

/// Two-segment linear remap through the calibration anchor (19 -> 75)
pub fn apply_heuristic_calibration(score: u8) -> u8 {
    let normalized = score.min(100) as f64;
    if normalized <= CALIBRATION_ANCHOR_RAW {
        return normalize_score(normalized / CALIBRATION_ANCHOR_RAW * CALIBRATION_ANCHOR_MAPPED);
    }
    let remaining_raw = 100.0 - CALIBRATION_ANCHOR_RAW;
    let remaining_mapped = 100.0 - CALIBRATION_ANCHOR_MAPPED;
    normalize_score(
        CALIBRATION_ANCHOR_MAPPED
            + (normalized - CALIBRATION_ANCHOR_RAW) / remaining_raw * remaining_mapped,
    )
}

#[derive(Debug, Clone, Copy, Default)]
struct SocialCounts {
    urls: usize,
    mentions: usize,
    hashtags: usize,
}

fn count_social_signals(text: &str) -> SocialCounts {
    let url_matches = url_re().find_iter(text).count();
    let www_matches = www_re().find_iter(text).count();
    let without_http = url_re().replace_all(text, " ");
    let without_http = www_re().replace_all(&without_http, " ");
    let bare_matches = bare_url_re().find_iter(&without_http).count();
    let without_urls = bare_url_re().replace_all(&without_http, " ");

    SocialCounts {
        urls: url_matches + www_matches + bare_matches,
        mentions: mention_re().find_iter(&without_urls).count(),
        hashtags: hashtag_re().find_iter(&without_urls).count(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ListInfo {
    count: usize,
    has_small_index: bool,
}

fn analyze_list_items(text: &str) -> ListInfo {
    let numbers: Vec<Option<u64>> = list_item_re()
        .captures_iter(text)
        .map(|caps| caps.get(1).and_then(|m| m.as_str().parse().ok()))
        .collect();
    ListInfo {
        count: numbers.len(),
        has_small_index: numbers.iter().any(|n| matches!(n, Some(v) if *v <= 5)),
    }
}

/// Intermediate values of one heuristic pass
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicBreakdown {
    pub positive: f64,
    pub negative: f64,
    /// combined score after amplification, before the curve
    pub raw: f64,
    pub curve_power: f64,
    pub curved: u8,
    pub score: u8,
}

impl HeuristicBreakdown {
    fn empty() -> Self {
        Self {
            positive: 0.0,
            negative: 0.0,
            raw: 0.0,
            curve_power: HEURISTIC_SCORE_POWER,
            curved: 0,
            score: 0,
        }
    }
}

/// Score 0..=100 estimating how likely the text is AI-generated
pub fn heuristic_score(text: &str) -> u8 {
    analyze_heuristics(text).score
}

/// Full heuristic pass, exposing the intermediate scores
pub fn analyze_heuristics(text: &str) -> HeuristicBreakdown {
    let text = normalize_whitespace(text);
    if !has_letter(&text) {
        return HeuristicBreakdown::empty();
    }
    let text = text.as_str();

    let metrics = TextMetrics::compute(text);
    let word_count = metrics.word_count;
    let lf = metrics.length_factor();

    let mut positive: f64 = 0.0;
    let mut negative: f64 = 0.0;

    let strong = strong_set().count(text);
    positive += (strong * 18).min(60) as f64;

    let weak = weak_set().count(text);
    positive += (weak * 12).min(60) as f64 * lf;

    let formal = formal_set().count(text);
    positive += (formal * 6).min(24) as f64 * lf;
    if formal > 0 && weak > 0 {
        positive += 10.0 * lf;
    }

    let structure = structure_set().count(text);
    positive += (structure * 6).min(18) as f64 * lf;
    if structure >= 2 && word_count >= 12 {
        positive += 12.0 * lf;
    }

    let topic = topic_set().count(text);
    let soft_topic = soft_topic_set().count(text);
    let core_topic = core_topic_set().count(text);
    if topic > 0 {
        positive += (topic * 6).min(36) as f64 * lf;
    }
    if soft_topic > 0 {
        positive += (soft_topic * 2).min(8) as f64 * lf;
    }
    if topic >= 2 && word_count >= 8 {
        positive = positive.max(75.0);
    }
    if topic >= 3 && word_count >= 10 {
        positive = positive.max(85.0);
    }
    if topic >= 4 {
        positive = positive.max(90.0);
    }

    let list = analyze_list_items(text);
    if list.count >= 2 && list.has_small_index {
        positive += 12.0 * lf;
    }

    if word_count >= 12 && (weak >= 2 || (weak >= 1 && formal >= 1)) {
        positive = positive.max(70.0);
    }
    if word_count >= 12 && structure >= 2 && list.count >= 2 {
        positive = positive.max(65.0);
    }

    if word_count >= 12 {
        if metrics.unique_ratio < 0.55 {
            positive += 12.0 * lf;
        }
        if metrics.unique_ratio < 0.45 {
            positive += 8.0 * lf;
        }
    }

    if metrics.sentence_count >= 2 {
        if metrics.avg_words_per_sentence >= 18.0 {
            positive += 8.0 * lf;
        }
        if metrics.avg_words_per_sentence >= 26.0 {
            positive += 8.0 * lf;
        }
    }

    if word_count >= 12 {
        if metrics.punctuation_ratio < 0.01 {
            positive += 6.0 * lf;
        }
        if metrics.punctuation_ratio < 0.005 {
            positive += 8.0 * lf;
        }
    }

    if word_count >= 35 {
        positive += 6.0 * lf;
    }
    if word_count >= 50 {
        positive += 8.0 * lf;
    }

    let has_contraction = contraction_re().is_match(text);
    if word_count >= 12 && !has_contraction {
        positive += 4.0 * lf;
    }
    if word_count >= 20 && !has_contraction && formal > 0 {
        positive += 6.0 * lf;
    }

    if has_contraction {
        negative += 4.0;
    }
    if word_count <= 6 {
        negative += 12.0;
    }
    if word_count <= 3 {
        negative += 8.0;
    }
    if casual_set().count(text) > 0 {
        negative += 6.0;
    }

    let social = count_social_signals(text);
    let tickers = ticker_re().find_iter(text).count();
    let has_emoji = emoji_re().is_match(text);
    let url_penalty = (social.urls as f64 * 1.5).min(4.0);
    let mut mention_penalty = (social.mentions as f64 * 4.0).min(12.0);
    let hashtag_penalty = (social.hashtags as f64 * 0.5).min(3.0);
    if core_topic >= 1 || tickers > 0 {
        mention_penalty *= 0.6;
    }
    negative += url_penalty + mention_penalty + hashtag_penalty;
    if social.hashtags >= 2 && social.mentions == 0 {
        positive += 6.0 * lf;
    }
    if social.hashtags >= 3 {
        positive += 6.0 * lf;
    }
    if core_topic == 1 && word_count >= 10 && (social.hashtags >= 1 || has_emoji) {
        positive = positive.max(55.0);
    }

    if tickers > 0 {
        positive += (tickers * 10).min(24) as f64 * lf;
        if word_count >= 4 {
            positive = positive.max(45.0);
        }
    }

    if text.ends_with('?') {
        negative += 3.0;
    }
    if repeated_marks_re().is_match(text) {
        negative += 4.0;
    }
    if has_emoji {
        negative += 1.0;
    }

    if strong > 0 {
        negative *= 0.7;
    } else if weak > 2 && formal > 0 {
        negative *= 0.85;
    } else if topic >= 2 {
        negative *= 0.9;
    }

    if strong > 0 && positive < 90.0 {
        positive = 90.0;
    }

    let mut score = positive - negative.max(0.0);

    if word_count >= 12 && (weak > 0 || formal > 0) && score > 35.0 {
        score = (score * 1.5).min(100.0);
    }
    if word_count >= 12 && structure >= 2 && score > 30.0 {
        score = (score * 1.25).min(100.0);
    }
    if topic >= 2 && score > 30.0 {
        score = (score * 1.25).min(100.0);
    }

    let structure_boosted = word_count >= 12 && structure >= 2 && weak > 0;
    if structure_boosted && score < 90.0 {
        score = 90.0;
    }

    let curve_power = if strong > 0 {
        1.2
    } else if structure_boosted {
        1.1
    } else if positive >= 55.0 {
        1.3
    } else {
        HEURISTIC_SCORE_POWER
    };

    let curved = apply_heuristic_curve(score, curve_power);
    HeuristicBreakdown {
        positive,
        negative,
        raw: score,
        curve_power,
        curved,
        score: apply_heuristic_calibration(curved),
    }
}
