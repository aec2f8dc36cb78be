//! Sentence matching: normalization, similarity scoring, and ranking.
//!
//! The similarity of two normalized sentences is the larger of their token
//! Jaccard overlap and their character edit ratio. Anything short of exact
//! equality is capped below `1.0`, so a perfect score always means an exact
//! normalized match against some trigger.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::model::{Rule, Trigger};
use crate::types::MatchCandidate;

/// Highest score an inexact pair can reach.
const MAX_INEXACT_SCORE: f64 = 0.99;

/// Normalize text for matching.
///
/// Lowercases, drops apostrophes (`what's` -> `whats`), turns every other
/// non-alphanumeric character into a space, and collapses runs of
/// whitespace.
pub fn normalize(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        if c.is_alphanumeric() {
            cleaned.extend(c.to_lowercase());
        } else {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of whitespace-separated tokens in already-normalized text.
pub fn token_len(normalized: &str) -> usize {
    normalized.split_whitespace().count()
}

/// Symmetric similarity of two normalized sentences in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    token_jaccard(a, b)
        .max(edit_ratio(a, b))
        .min(MAX_INEXACT_SCORE)
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    let union = ta.union(&tb).count();
    if union == 0 {
        return 0.0;
    }
    ta.intersection(&tb).count() as f64 / union as f64
}

fn edit_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

// =============================================================================
// SentenceMatcher
// =============================================================================

/// Scores an utterance against a candidate set of rules.
#[derive(Debug, Clone)]
pub struct SentenceMatcher {
    /// Maximum number of ranked candidates returned.
    pub max_candidates: usize,
}

impl SentenceMatcher {
    pub fn new(max_candidates: usize) -> Self {
        Self { max_candidates }
    }

    /// Rank `rules` against `utterance`.
    ///
    /// Each rule contributes at most one candidate: its best-scoring trigger
    /// variant. A rule's own threshold overrides `threshold`. Results are
    /// sorted by score descending, then by the token length of the matched
    /// variant descending, then by the order of `rules`.
    pub fn match_rules<'a>(
        &self,
        utterance: &str,
        rules: impl IntoIterator<Item = &'a Rule>,
        threshold: f64,
    ) -> Vec<MatchCandidate> {
        self.match_rules_biased(utterance, rules, threshold, 0.0)
    }

    /// Like [`match_rules`](Self::match_rules), with every effective
    /// threshold lowered by `bias`.
    pub fn match_rules_biased<'a>(
        &self,
        utterance: &str,
        rules: impl IntoIterator<Item = &'a Rule>,
        threshold: f64,
        bias: f64,
    ) -> Vec<MatchCandidate> {
        let normalized = normalize(utterance);
        let mut scored: Vec<(MatchCandidate, usize)> = Vec::new();

        for rule in rules {
            let Some((trigger, score)) = best_trigger(rule, &normalized) else {
                continue;
            };
            let effective = (rule.threshold().unwrap_or(threshold) - bias).max(0.0);
            if score < effective {
                continue;
            }
            scored.push((
                MatchCandidate {
                    rule_id: rule.id().clone(),
                    group_id: rule.group().clone(),
                    variant: trigger.text.clone(),
                    score,
                },
                trigger.token_len,
            ));
        }

        // Stable sort keeps input order as the last tie-break.
        scored.sort_by(|(a, a_len), (b, b_len)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b_len.cmp(a_len))
        });
        scored.truncate(self.max_candidates);
        scored.into_iter().map(|(candidate, _)| candidate).collect()
    }

    /// The single best candidate, if any cleared its threshold.
    pub fn best<'a>(
        &self,
        utterance: &str,
        rules: impl IntoIterator<Item = &'a Rule>,
        threshold: f64,
        bias: f64,
    ) -> Option<MatchCandidate> {
        self.match_rules_biased(utterance, rules, threshold, bias)
            .into_iter()
            .next()
    }
}

impl Default for SentenceMatcher {
    fn default() -> Self {
        Self::new(5)
    }
}

fn best_trigger<'r>(rule: &'r Rule, normalized: &str) -> Option<(&'r Trigger, f64)> {
    let mut best: Option<(&Trigger, f64)> = None;
    for trigger in rule.triggers() {
        let score = similarity(normalized, &trigger.normalized);
        let better = match best {
            None => true,
            Some((current, current_score)) => {
                score > current_score
                    || (score == current_score && trigger.token_len > current.token_len)
            }
        };
        if better {
            best = Some((trigger, score));
        }
    }
    best
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    fn model() -> Model {
        Model::from_json(
            r#"{
                "groups": [
                    { "name": "greeting", "rules": [
                        { "id": "greet", "triggers": ["hi", "hello"], "responses": ["Hello!"] },
                        { "id": "greet_long", "triggers": ["hello there friend"], "responses": ["Hey friend."] }
                    ]},
                    { "name": "weather", "rules": [
                        { "id": "weather", "triggers": ["what is the weather like", "is it raining"], "responses": ["Sunny."] },
                        { "id": "strict", "triggers": ["weather report"], "responses": ["Report."], "confidence_threshold": 0.99 }
                    ]}
                ]
            }"#,
        )
        .unwrap()
    }

    // ---- normalize ----

    #[test]
    fn test_normalize_lowercases_and_strips_punctuation() {
        assert_eq!(normalize("Hello, World!"), "hello world");
        assert_eq!(normalize("What's your name?"), "whats your name");
        assert_eq!(normalize("  lots   of\tspace \n"), "lots of space");
    }

    #[test]
    fn test_normalize_punctuation_splits_words() {
        assert_eq!(normalize("rock-and-roll"), "rock and roll");
        assert_eq!(normalize("?!..."), "");
    }

    #[test]
    fn test_normalize_unicode() {
        assert_eq!(normalize("Qu'est-ce CAFÉ"), "quest ce café");
    }

    #[test]
    fn test_token_len() {
        assert_eq!(token_len("hello there friend"), 3);
        assert_eq!(token_len(""), 0);
    }

    // ---- similarity ----

    #[test]
    fn test_similarity_exact_is_one() {
        assert_eq!(similarity("hello", "hello"), 1.0);
    }

    #[test]
    fn test_similarity_inexact_below_one() {
        // Same token set, different order
        let s = similarity("there hello", "hello there");
        assert!(s < 1.0);
        assert!(s >= 0.98);
    }

    #[test]
    fn test_similarity_symmetric() {
        let pairs = [
            ("i want to fly to paris", "i want to fly"),
            ("hello", "help"),
            ("weather today", "is it raining"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn test_similarity_monotonic_with_divergence() {
        let target = "what is the weather like";
        let close = similarity("what is the weather", target);
        let farther = similarity("what is the", target);
        let farthest = similarity("what", target);
        assert!(close > farther);
        assert!(farther > farthest);
    }

    #[test]
    fn test_similarity_empty() {
        assert_eq!(similarity("", "hello"), 0.0);
        assert_eq!(similarity("hello", ""), 0.0);
    }

    #[test]
    fn test_similarity_in_unit_range() {
        let s = similarity("quantum chromodynamics", "hi");
        assert!((0.0..=1.0).contains(&s));
        assert!(s < 0.2);
    }

    #[test]
    fn test_levenshtein_known_values() {
        let a: Vec<char> = "kitten".chars().collect();
        let b: Vec<char> = "sitting".chars().collect();
        assert_eq!(levenshtein(&a, &b), 3);
        assert_eq!(levenshtein(&a, &[]), 6);
    }

    // ---- SentenceMatcher ----

    #[test]
    fn test_every_trigger_matches_its_rule_exactly() {
        let model = model();
        let matcher = SentenceMatcher::default();
        for rule in model.rules() {
            for trigger in rule.triggers() {
                let results = matcher.match_rules(&trigger.text, model.rules(), 0.6);
                let hit = results
                    .iter()
                    .find(|c| &c.rule_id == rule.id())
                    .unwrap_or_else(|| panic!("no candidate for {}", trigger.text));
                assert_eq!(hit.score, 1.0);
            }
        }
    }

    #[test]
    fn test_match_ranks_by_score() {
        let model = model();
        let matcher = SentenceMatcher::default();
        let results = matcher.match_rules("hello", model.rules(), 0.1);
        assert_eq!(results[0].rule_id.as_str(), "greet");
        assert_eq!(results[0].variant, "hello");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_match_below_threshold_excluded() {
        let model = model();
        let matcher = SentenceMatcher::default();
        let results = matcher.match_rules("quantum chromodynamics", model.rules(), 0.6);
        assert!(results.is_empty());
    }

    #[test]
    fn test_rule_threshold_overrides_default() {
        let model = model();
        let matcher = SentenceMatcher::default();
        // "weather reports" is close to "weather report" but not exact
        let results = matcher.match_rules("weather reports", model.rules(), 0.5);
        assert!(results.iter().all(|c| c.rule_id.as_str() != "strict"));
    }

    #[test]
    fn test_bias_lowers_threshold() {
        let model = model();
        let matcher = SentenceMatcher::default();
        let rules: Vec<&Rule> = model.rules().filter(|r| r.id().as_str() == "weather").collect();
        let plain = matcher.match_rules("what is the weather", rules.iter().copied(), 0.9);
        let biased =
            matcher.match_rules_biased("what is the weather", rules.iter().copied(), 0.9, 0.2);
        assert!(plain.is_empty());
        assert_eq!(biased.len(), 1);
    }

    #[test]
    fn test_tie_prefers_longer_variant() {
        let model = Model::from_json(
            r#"{ "groups": [ { "name": "g", "rules": [
                { "id": "short", "triggers": ["abc"], "responses": ["s"] },
                { "id": "long", "triggers": ["ab c"], "responses": ["l"] }
            ]}]}"#,
        )
        .unwrap();
        let matcher = SentenceMatcher::default();
        // Both triggers share nothing with the input, so both score 0.0
        let results = matcher.match_rules("zzz", model.rules(), 0.0);
        assert_eq!(results[0].score, results[1].score);
        assert_eq!(results[0].rule_id.as_str(), "long");
    }

    #[test]
    fn test_max_candidates_truncates() {
        let model = model();
        let matcher = SentenceMatcher::new(1);
        let results = matcher.match_rules("hello", model.rules(), 0.0);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_best_returns_top() {
        let model = model();
        let matcher = SentenceMatcher::default();
        let best = matcher.best("is it raining?", model.rules(), 0.6, 0.0).unwrap();
        assert_eq!(best.rule_id.as_str(), "weather");
        assert_eq!(best.score, 1.0);
    }
}
