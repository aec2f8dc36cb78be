//! Response text: variant selection, slot templates, and the fixed replies
//! for navigation and cancellation.

use edgar_core::config::{ResponseConfig, SelectionPolicy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reply when an open slot request is abandoned.
pub const SLOT_CANCELLED_REPLY: &str = "Okay, I've cancelled that request.";

/// Picks one response variant per turn according to a reproducible policy.
#[derive(Debug, Clone)]
pub struct ResponseSelector {
    policy: SelectionPolicy,
    seed: u64,
}

impl ResponseSelector {
    pub fn new(policy: SelectionPolicy, seed: u64) -> Self {
        Self { policy, seed }
    }

    pub fn from_config(config: &ResponseConfig) -> Self {
        Self::new(config.selection, config.seed)
    }

    /// Index into `len` variants for the given turn number.
    ///
    /// The same `(policy, seed, turn, len)` always yields the same index.
    pub fn index(&self, len: usize, turn: u64) -> usize {
        if len <= 1 {
            return 0;
        }
        match self.policy {
            SelectionPolicy::First => 0,
            SelectionPolicy::RoundRobin => (turn % len as u64) as usize,
            SelectionPolicy::Seeded => {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(turn));
                rng.random_range(0..len)
            }
        }
    }

    pub fn select<'a>(&self, variants: &'a [String], turn: u64) -> Option<&'a str> {
        if variants.is_empty() {
            return None;
        }
        Some(variants[self.index(variants.len(), turn)].as_str())
    }
}

impl Default for ResponseSelector {
    fn default() -> Self {
        Self::from_config(&ResponseConfig::default())
    }
}

/// Substitute `{name}` placeholders with slot values.
///
/// Unknown placeholders are left as written.
pub fn render_template(template: &str, values: &[(String, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match values.iter().find(|(slot, _)| slot == name) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Reply to a "go back" command. `label` is the node returned to, if any.
pub fn back_reply(label: Option<&str>) -> String {
    match label {
        Some(label) => format!("Okay, going back to {}.", label),
        None => "We're already at the beginning of this conversation.".to_string(),
    }
}

/// Reply listing the follow-ups available at the current node.
pub fn options_reply(labels: &[&str]) -> String {
    if labels.is_empty() {
        "There are no more options at this level.".to_string()
    } else {
        format!("Available options: {}", labels.join(", "))
    }
}

pub fn exit_reply() -> String {
    "Okay, let's start fresh. What would you like to talk about?".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variants(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("variant {}", i)).collect()
    }

    // ---- Selection ----

    #[test]
    fn test_first_policy() {
        let sel = ResponseSelector::new(SelectionPolicy::First, 0);
        let v = variants(3);
        for turn in 0..10 {
            assert_eq!(sel.select(&v, turn), Some("variant 0"));
        }
    }

    #[test]
    fn test_round_robin_cycles() {
        let sel = ResponseSelector::new(SelectionPolicy::RoundRobin, 0);
        let v = variants(3);
        let picked: Vec<&str> = (0..6).filter_map(|t| sel.select(&v, t)).collect();
        assert_eq!(
            picked,
            vec!["variant 0", "variant 1", "variant 2", "variant 0", "variant 1", "variant 2"]
        );
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = ResponseSelector::new(SelectionPolicy::Seeded, 7);
        let b = ResponseSelector::new(SelectionPolicy::Seeded, 7);
        for turn in 0..50 {
            let i = a.index(4, turn);
            assert!(i < 4);
            assert_eq!(i, b.index(4, turn));
        }
    }

    #[test]
    fn test_seeded_uses_more_than_one_variant() {
        let sel = ResponseSelector::new(SelectionPolicy::Seeded, 42);
        let distinct: std::collections::HashSet<usize> =
            (0..100).map(|t| sel.index(5, t)).collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_single_and_empty_variants() {
        let sel = ResponseSelector::default();
        assert_eq!(sel.select(&variants(1), 99), Some("variant 0"));
        assert_eq!(sel.select(&[], 0), None);
    }

    // ---- Templates ----

    #[test]
    fn test_render_template_substitutes_slots() {
        let values = vec![
            ("origin".to_string(), "Boston".to_string()),
            ("destination".to_string(), "Paris".to_string()),
        ];
        assert_eq!(
            render_template("Booking a flight from {origin} to {destination}.", &values),
            "Booking a flight from Boston to Paris."
        );
    }

    #[test]
    fn test_render_template_keeps_unknown_and_unclosed() {
        let values = vec![("a".to_string(), "1".to_string())];
        assert_eq!(render_template("{a} {b} {a", &values), "1 {b} {a");
        assert_eq!(render_template("no placeholders", &values), "no placeholders");
    }

    // ---- Fixed replies ----

    #[test]
    fn test_navigation_replies() {
        assert_eq!(back_reply(Some("hello")), "Okay, going back to hello.");
        assert_eq!(
            back_reply(None),
            "We're already at the beginning of this conversation."
        );
        assert_eq!(
            options_reply(&["what's your name", "how are you"]),
            "Available options: what's your name, how are you"
        );
        assert_eq!(options_reply(&[]), "There are no more options at this level.");
    }
}
