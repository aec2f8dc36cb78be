//! Model store: the immutable, validated rule graph of a session.
//!
//! A [`ModelDocument`] is the interchange format written by the training
//! tool. [`Model::from_document`] validates it completely before anything is
//! built; a document that violates any structural rule yields a
//! [`LoadError`] and no model.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ChatError, LoadError, LoadErrorKind};
use crate::matcher::{normalize, token_len};
use crate::types::{GroupId, RuleId};

/// Fallback variants used when a document does not supply its own.
const DEFAULT_FALLBACKS: &[&str] = &[
    "I'm not sure about that yet. Could you ask something else?",
    "I don't have information about that currently.",
    "That's beyond my knowledge at the moment.",
];

// =============================================================================
// Interchange document
// =============================================================================

/// Serialized rule set as produced by the training tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_responses: Vec<String>,
    pub groups: Vec<GroupDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupDocument {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub id: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub responses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_up: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slot_names: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slot_prompts: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slot_patterns: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

// =============================================================================
// Loaded model
// =============================================================================

/// A trigger phrase with its normalized form cached.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub text: String,
    pub normalized: String,
    pub token_len: usize,
}

impl Trigger {
    fn new(text: &str) -> Self {
        let normalized = normalize(text);
        let token_len = token_len(&normalized);
        Self {
            text: text.to_string(),
            normalized,
            token_len,
        }
    }
}

/// A named piece of information a multi-part rule needs.
#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub name: String,
    pub prompt: String,
    /// Recognizes the value in free text; capture group 1 is the value.
    pub pattern: Option<Regex>,
    authored_prompt: bool,
}

impl SlotSpec {
    /// Pull this slot's value out of `text`, if the pattern finds one.
    pub fn extract(&self, text: &str) -> Option<String> {
        let pattern = self.pattern.as_ref()?;
        let caps = pattern.captures(text)?;
        let value = caps.get(1).or_else(|| caps.get(0))?.as_str().trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    id: RuleId,
    group: GroupId,
    triggers: Vec<Trigger>,
    responses: Vec<String>,
    follow_up: Vec<RuleId>,
    threshold: Option<f64>,
    slots: Vec<SlotSpec>,
    module: Option<String>,
}

impl Rule {
    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    pub fn follow_up(&self) -> &[RuleId] {
        &self.follow_up
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn slots(&self) -> &[SlotSpec] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|s| s.name == name)
    }

    pub fn requires_slots(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Human-readable label: the first authored trigger.
    pub fn label(&self) -> &str {
        self.triggers
            .first()
            .map(|t| t.text.as_str())
            .unwrap_or_else(|| self.id.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    rules: Vec<RuleId>,
    entry_points: Vec<RuleId>,
}

impl Group {
    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn name(&self) -> &str {
        self.id.as_str()
    }

    pub fn rules(&self) -> &[RuleId] {
        &self.rules
    }

    /// Rules reachable without prior context: those no follow-up points to.
    pub fn entry_points(&self) -> &[RuleId] {
        &self.entry_points
    }
}

/// The validated rule graph. Rules live in an arena indexed by id.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    groups: Vec<Group>,
    group_index: HashMap<GroupId, usize>,
    rules: Vec<Rule>,
    rule_index: HashMap<RuleId, usize>,
    fallback_responses: Vec<String>,
}

impl Model {
    /// Parse and validate a JSON model document.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let doc: ModelDocument =
            serde_json::from_str(json).map_err(|e| LoadError::malformed(e.to_string()))?;
        Self::from_document(doc)
    }

    /// Read, parse, and validate a JSON model file.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let content = std::fs::read_to_string(path)?;
        match Self::from_json(&content) {
            Ok(model) => {
                info!(
                    path = %path.display(),
                    groups = model.groups.len(),
                    rules = model.rules.len(),
                    "Model loaded"
                );
                Ok(model)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Model rejected");
                Err(e.into())
            }
        }
    }

    /// Validate a document and build the model from it.
    pub fn from_document(doc: ModelDocument) -> Result<Self, LoadError> {
        let mut groups = Vec::with_capacity(doc.groups.len());
        let mut group_index = HashMap::new();
        let mut rules = Vec::new();
        let mut rule_index = HashMap::new();

        for group_doc in &doc.groups {
            let group_id = GroupId::new(group_doc.name.clone());
            if group_doc.name.trim().is_empty() {
                return Err(LoadError::malformed("group name must not be empty"));
            }
            if group_index.contains_key(&group_id) {
                return Err(LoadError::new(LoadErrorKind::DuplicateGroupName).in_group(&group_id));
            }

            let mut member_ids = Vec::with_capacity(group_doc.rules.len());
            for rule_doc in &group_doc.rules {
                let rule = build_rule(rule_doc, &group_id)?;
                if rule_index.contains_key(&rule.id) {
                    return Err(LoadError::new(LoadErrorKind::DuplicateRuleId)
                        .in_group(&group_id)
                        .in_rule(&rule.id));
                }
                rule_index.insert(rule.id.clone(), rules.len());
                member_ids.push(rule.id.clone());
                rules.push(rule);
            }

            group_index.insert(group_id.clone(), groups.len());
            groups.push(Group {
                id: group_id,
                rules: member_ids,
                entry_points: Vec::new(),
            });
        }

        // Follow-up references: existence and group locality.
        for rule in &rules {
            for target in &rule.follow_up {
                let Some(&idx) = rule_index.get(target) else {
                    return Err(LoadError::new(LoadErrorKind::DanglingFollowUp)
                        .in_group(&rule.group)
                        .in_rule(&rule.id)
                        .with_reference(target.as_str()));
                };
                if rules[idx].group != rule.group {
                    return Err(LoadError::new(LoadErrorKind::CrossGroupFollowUp)
                        .in_group(&rule.group)
                        .in_rule(&rule.id)
                        .with_reference(target.as_str()));
                }
            }
        }

        check_acyclic(&rules, &rule_index)?;

        let targets: HashSet<&RuleId> = rules.iter().flat_map(|r| r.follow_up.iter()).collect();
        for group in &mut groups {
            group.entry_points = group
                .rules
                .iter()
                .filter(|id| !targets.contains(id))
                .cloned()
                .collect();
        }

        let fallback_responses = if doc.fallback_responses.iter().any(|r| !r.trim().is_empty()) {
            doc.fallback_responses
                .into_iter()
                .filter(|r| !r.trim().is_empty())
                .collect()
        } else {
            DEFAULT_FALLBACKS.iter().map(|s| s.to_string()).collect()
        };

        Ok(Self {
            name: doc.name,
            groups,
            group_index,
            rules,
            rule_index,
            fallback_responses,
        })
    }

    /// Re-serialize into the interchange format.
    pub fn to_document(&self) -> ModelDocument {
        let groups = self
            .groups
            .iter()
            .map(|group| GroupDocument {
                name: group.name().to_string(),
                rules: group
                    .rules
                    .iter()
                    .filter_map(|id| self.rule(id))
                    .map(rule_to_document)
                    .collect(),
            })
            .collect();
        ModelDocument {
            name: self.name.clone(),
            fallback_responses: self.fallback_responses.clone(),
            groups,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_document())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule(&self, id: &RuleId) -> Option<&Rule> {
        self.rule_index.get(id).map(|&idx| &self.rules[idx])
    }

    pub fn group(&self, id: &GroupId) -> Option<&Group> {
        self.group_index.get(id).map(|&idx| &self.groups[idx])
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// All rules owned by `group`, in authored order.
    pub fn group_rules<'a>(&'a self, group: &'a Group) -> impl Iterator<Item = &'a Rule> + 'a {
        group.rules.iter().filter_map(move |id| self.rule(id))
    }

    /// Direct followers of `id`, in authored order.
    pub fn followers<'a>(&'a self, id: &RuleId) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rule(id)
            .map(|rule| rule.follow_up.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(move |target| self.rule(target))
    }

    pub fn fallback_responses(&self) -> &[String] {
        &self.fallback_responses
    }

    /// Whether `rule` can be reached from an entry point of `group` through
    /// zero or more follow-up edges.
    pub fn is_reachable_in_group(&self, group: &GroupId, rule: &RuleId) -> bool {
        let Some(group) = self.group(group) else {
            return false;
        };
        let mut stack: Vec<&RuleId> = group.entry_points.iter().collect();
        let mut seen: HashSet<&RuleId> = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == rule {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(r) = self.rule(current) {
                stack.extend(r.follow_up.iter());
            }
        }
        false
    }
}

fn build_rule(doc: &RuleDocument, group: &GroupId) -> Result<Rule, LoadError> {
    let id = RuleId::new(doc.id.clone());
    if doc.id.trim().is_empty() {
        return Err(LoadError::malformed("rule id must not be empty").in_group(group));
    }
    let fail = |kind: LoadErrorKind| LoadError::new(kind).in_group(group).in_rule(&id);

    if doc.triggers.is_empty() {
        return Err(fail(LoadErrorKind::EmptyTriggers));
    }
    let triggers: Vec<Trigger> = doc.triggers.iter().map(|t| Trigger::new(t)).collect();
    if let Some(blank) = triggers.iter().find(|t| t.normalized.is_empty()) {
        return Err(fail(LoadErrorKind::EmptyTriggers).with_reference(blank.text.clone()));
    }

    if doc.responses.is_empty() || doc.responses.iter().all(|r| r.trim().is_empty()) {
        return Err(fail(LoadErrorKind::EmptyResponses));
    }

    if let Some(threshold) = doc.confidence_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(fail(LoadErrorKind::InvalidThreshold).with_detail(threshold.to_string()));
        }
    }

    let mut seen_slots = HashSet::new();
    for name in &doc.slot_names {
        if !seen_slots.insert(name.as_str()) {
            return Err(fail(LoadErrorKind::DuplicateSlot).with_reference(name.clone()));
        }
    }
    for name in doc.slot_prompts.keys().chain(doc.slot_patterns.keys()) {
        if !seen_slots.contains(name.as_str()) {
            return Err(fail(LoadErrorKind::UnknownSlot).with_reference(name.clone()));
        }
    }

    let mut slots = Vec::with_capacity(doc.slot_names.len());
    for name in &doc.slot_names {
        let pattern = match doc.slot_patterns.get(name) {
            Some(src) => Some(Regex::new(src).map_err(|e| {
                fail(LoadErrorKind::InvalidSlotPattern)
                    .with_reference(name.clone())
                    .with_detail(e.to_string())
            })?),
            None => None,
        };
        let (prompt, authored_prompt) = match doc.slot_prompts.get(name) {
            Some(p) => (p.clone(), true),
            None => (format!("What is the {}?", name.replace('_', " ")), false),
        };
        slots.push(SlotSpec {
            name: name.clone(),
            prompt,
            pattern,
            authored_prompt,
        });
    }

    Ok(Rule {
        id: id.clone(),
        group: group.clone(),
        triggers,
        responses: doc.responses.clone(),
        follow_up: doc.follow_up.iter().map(|s| RuleId::new(s.clone())).collect(),
        threshold: doc.confidence_threshold,
        slots,
        module: doc.module.clone().filter(|m| !m.trim().is_empty()),
    })
}

fn rule_to_document(rule: &Rule) -> RuleDocument {
    RuleDocument {
        id: rule.id.to_string(),
        triggers: rule.triggers.iter().map(|t| t.text.clone()).collect(),
        responses: rule.responses.clone(),
        follow_up: rule.follow_up.iter().map(|r| r.to_string()).collect(),
        slot_names: rule.slots.iter().map(|s| s.name.clone()).collect(),
        slot_prompts: rule
            .slots
            .iter()
            .filter(|s| s.authored_prompt)
            .map(|s| (s.name.clone(), s.prompt.clone()))
            .collect(),
        slot_patterns: rule
            .slots
            .iter()
            .filter_map(|s| s.pattern.as_ref().map(|p| (s.name.clone(), p.as_str().to_string())))
            .collect(),
        confidence_threshold: rule.threshold,
        module: rule.module.clone(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first search over follow-up edges; a back edge is a cycle.
fn check_acyclic(rules: &[Rule], index: &HashMap<RuleId, usize>) -> Result<(), LoadError> {
    let mut marks = vec![Mark::Unvisited; rules.len()];

    for start in 0..rules.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        // (rule index, next follower position)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::InProgress;

        while let Some(top) = stack.last_mut() {
            let (node, pos) = *top;
            let follow_up = &rules[node].follow_up;
            if pos >= follow_up.len() {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            }
            top.1 += 1;
            let target = &follow_up[pos];
            // References were checked before this runs.
            let Some(&child) = index.get(target) else {
                continue;
            };
            match marks[child] {
                Mark::InProgress => {
                    return Err(LoadError::new(LoadErrorKind::CyclicFollowUp)
                        .in_group(&rules[node].group)
                        .in_rule(&rules[node].id)
                        .with_reference(target.as_str()));
                }
                Mark::Unvisited => {
                    marks[child] = Mark::InProgress;
                    stack.push((child, 0));
                }
                Mark::Done => {}
            }
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = r#"{
        "name": "demo",
        "groups": [
            { "name": "greeting", "rules": [
                { "id": "greet", "triggers": ["hi", "hello"],
                  "responses": ["Hello! How can I help?"], "follow_up": ["ask_name"] },
                { "id": "ask_name", "triggers": ["what's your name"],
                  "responses": ["I'm Edgar."], "follow_up": ["ask_age"] },
                { "id": "ask_age", "triggers": ["how old are you"], "responses": ["Timeless."] }
            ]},
            { "name": "travel", "rules": [
                { "id": "book_flight", "triggers": ["i want to fly", "book a flight"],
                  "responses": ["Booking a flight from {origin} to {destination}."],
                  "slot_names": ["origin", "destination"],
                  "slot_prompts": { "origin": "Where are you flying from?" },
                  "slot_patterns": { "origin": "\\bfrom\\s+([A-Z]\\w*)", "destination": "\\bto\\s+([A-Z]\\w*)" },
                  "confidence_threshold": 0.7 }
            ]}
        ]
    }"#;

    fn kind_of(json: &str) -> LoadErrorKind {
        Model::from_json(json).unwrap_err().kind
    }

    // ---- Successful load ----

    #[test]
    fn test_load_demo_model() {
        let model = Model::from_json(DEMO).unwrap();
        assert_eq!(model.name(), "demo");
        assert_eq!(model.rule_count(), 4);
        assert_eq!(model.groups().count(), 2);

        let greet = model.rule(&RuleId::from("greet")).unwrap();
        assert_eq!(greet.group().as_str(), "greeting");
        assert_eq!(greet.triggers()[1].normalized, "hello");
        assert_eq!(greet.follow_up(), &[RuleId::from("ask_name")]);
        assert_eq!(greet.label(), "hi");
    }

    #[test]
    fn test_entry_points_exclude_follow_up_targets() {
        let model = Model::from_json(DEMO).unwrap();
        let greeting = model.group(&GroupId::from("greeting")).unwrap();
        assert_eq!(greeting.entry_points(), &[RuleId::from("greet")]);
        assert_eq!(greeting.rules().len(), 3);
    }

    #[test]
    fn test_followers_in_authored_order() {
        let model = Model::from_json(DEMO).unwrap();
        let followers: Vec<_> = model
            .followers(&RuleId::from("greet"))
            .map(|r| r.id().as_str())
            .collect();
        assert_eq!(followers, vec!["ask_name"]);
        assert_eq!(model.followers(&RuleId::from("missing")).count(), 0);
    }

    #[test]
    fn test_slot_specs_built() {
        let model = Model::from_json(DEMO).unwrap();
        let rule = model.rule(&RuleId::from("book_flight")).unwrap();
        assert!(rule.requires_slots());
        assert_eq!(rule.slots()[0].prompt, "Where are you flying from?");
        assert_eq!(rule.slots()[1].prompt, "What is the destination?");
        assert_eq!(
            rule.slot("destination").unwrap().extract("I want to fly to Paris"),
            Some("Paris".to_string())
        );
        assert_eq!(rule.slot("origin").unwrap().extract("I want to fly to Paris"), None);
        assert_eq!(rule.threshold(), Some(0.7));
    }

    #[test]
    fn test_default_fallbacks_when_absent() {
        let model = Model::from_json(DEMO).unwrap();
        assert_eq!(model.fallback_responses().len(), 3);
    }

    #[test]
    fn test_reachability() {
        let model = Model::from_json(DEMO).unwrap();
        let greeting = GroupId::from("greeting");
        assert!(model.is_reachable_in_group(&greeting, &RuleId::from("greet")));
        assert!(model.is_reachable_in_group(&greeting, &RuleId::from("ask_age")));
        assert!(!model.is_reachable_in_group(&greeting, &RuleId::from("book_flight")));
        assert!(!model.is_reachable_in_group(&GroupId::from("nope"), &RuleId::from("greet")));
    }

    // ---- Validation failures ----

    #[test]
    fn test_malformed_json() {
        assert_eq!(kind_of("{ not json"), LoadErrorKind::Malformed);
        assert_eq!(kind_of(r#"{ "name": "no groups" }"#), LoadErrorKind::Malformed);
    }

    #[test]
    fn test_duplicate_group_name() {
        let json = r#"{ "groups": [
            { "name": "a", "rules": [] },
            { "name": "a", "rules": [] }
        ]}"#;
        let err = Model::from_json(json).unwrap_err();
        assert_eq!(err.kind, LoadErrorKind::DuplicateGroupName);
        assert_eq!(err.group, Some(GroupId::from("a")));
    }

    #[test]
    fn test_duplicate_rule_id_across_groups() {
        let json = r#"{ "groups": [
            { "name": "a", "rules": [ { "id": "x", "triggers": ["t"], "responses": ["r"] } ] },
            { "name": "b", "rules": [ { "id": "x", "triggers": ["u"], "responses": ["s"] } ] }
        ]}"#;
        let err = Model::from_json(json).unwrap_err();
        assert_eq!(err.kind, LoadErrorKind::DuplicateRuleId);
        assert_eq!(err.rule, Some(RuleId::from("x")));
        assert_eq!(err.group, Some(GroupId::from("b")));
    }

    #[test]
    fn test_empty_triggers_and_responses() {
        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "x", "triggers": [], "responses": ["r"] } ] } ] }"#;
        assert_eq!(kind_of(json), LoadErrorKind::EmptyTriggers);

        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "x", "triggers": ["?!"], "responses": ["r"] } ] } ] }"#;
        assert_eq!(kind_of(json), LoadErrorKind::EmptyTriggers);

        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "x", "triggers": ["t"], "responses": [] } ] } ] }"#;
        assert_eq!(kind_of(json), LoadErrorKind::EmptyResponses);

        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "x", "triggers": ["t"], "responses": ["   "] } ] } ] }"#;
        assert_eq!(kind_of(json), LoadErrorKind::EmptyResponses);
    }

    #[test]
    fn test_dangling_follow_up_names_rule_and_reference() {
        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "greet", "triggers": ["hi"], "responses": ["r"], "follow_up": ["ghost"] } ] } ] }"#;
        let err = Model::from_json(json).unwrap_err();
        assert_eq!(err.kind, LoadErrorKind::DanglingFollowUp);
        assert_eq!(err.rule, Some(RuleId::from("greet")));
        assert_eq!(err.reference.as_deref(), Some("ghost"));
        assert!(err.to_string().contains("greet"));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_cycle_detected() {
        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "x", "triggers": ["x"], "responses": ["r"], "follow_up": ["y"] },
            { "id": "y", "triggers": ["y"], "responses": ["r"], "follow_up": ["z"] },
            { "id": "z", "triggers": ["z"], "responses": ["r"], "follow_up": ["x"] }
        ] } ] }"#;
        let err = Model::from_json(json).unwrap_err();
        assert_eq!(err.kind, LoadErrorKind::CyclicFollowUp);
        assert_eq!(err.reference.as_deref(), Some("x"));
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "x", "triggers": ["x"], "responses": ["r"], "follow_up": ["x"] } ] } ] }"#;
        assert_eq!(kind_of(json), LoadErrorKind::CyclicFollowUp);
    }

    #[test]
    fn test_diamond_is_not_cycle() {
        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "top", "triggers": ["top"], "responses": ["r"], "follow_up": ["l", "r"] },
            { "id": "l", "triggers": ["left"], "responses": ["r"], "follow_up": ["bottom"] },
            { "id": "r", "triggers": ["right"], "responses": ["r"], "follow_up": ["bottom"] },
            { "id": "bottom", "triggers": ["bottom"], "responses": ["r"] }
        ] } ] }"#;
        assert!(Model::from_json(json).is_ok());
    }

    #[test]
    fn test_cross_group_follow_up_rejected() {
        let json = r#"{ "groups": [
            { "name": "a", "rules": [ { "id": "x", "triggers": ["x"], "responses": ["r"], "follow_up": ["y"] } ] },
            { "name": "b", "rules": [ { "id": "y", "triggers": ["y"], "responses": ["r"] } ] }
        ]}"#;
        assert_eq!(kind_of(json), LoadErrorKind::CrossGroupFollowUp);
    }

    #[test]
    fn test_invalid_threshold() {
        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "x", "triggers": ["x"], "responses": ["r"], "confidence_threshold": 1.2 } ] } ] }"#;
        assert_eq!(kind_of(json), LoadErrorKind::InvalidThreshold);
    }

    #[test]
    fn test_slot_validation() {
        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "x", "triggers": ["x"], "responses": ["r"], "slot_names": ["a", "a"] } ] } ] }"#;
        assert_eq!(kind_of(json), LoadErrorKind::DuplicateSlot);

        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "x", "triggers": ["x"], "responses": ["r"], "slot_names": ["a"],
              "slot_prompts": { "b": "?" } } ] } ] }"#;
        assert_eq!(kind_of(json), LoadErrorKind::UnknownSlot);

        let json = r#"{ "groups": [ { "name": "a", "rules": [
            { "id": "x", "triggers": ["x"], "responses": ["r"], "slot_names": ["a"],
              "slot_patterns": { "a": "(unclosed" } } ] } ] }"#;
        assert_eq!(kind_of(json), LoadErrorKind::InvalidSlotPattern);
    }

    // ---- Round trip ----

    #[test]
    fn test_round_trip_preserves_graph() {
        let model = Model::from_json(DEMO).unwrap();
        let reloaded = Model::from_json(&model.to_json().unwrap()).unwrap();

        let names = |m: &Model| m.groups().map(|g| g.name().to_string()).collect::<Vec<_>>();
        assert_eq!(names(&model), names(&reloaded));

        for rule in model.rules() {
            let other = reloaded.rule(rule.id()).unwrap();
            assert_eq!(other.group(), rule.group());
            let texts = |r: &Rule| r.triggers().iter().map(|t| t.text.clone()).collect::<Vec<_>>();
            assert_eq!(texts(other), texts(rule));
            assert_eq!(other.responses(), rule.responses());
            assert_eq!(other.follow_up(), rule.follow_up());
            assert_eq!(other.threshold(), rule.threshold());
            assert_eq!(other.slots().len(), rule.slots().len());
        }
        assert_eq!(model.to_document(), reloaded.to_document());
    }

    #[test]
    fn test_round_trip_does_not_invent_prompts() {
        let model = Model::from_json(DEMO).unwrap();
        let doc = model.to_document();
        let flight = &doc.groups[1].rules[0];
        assert_eq!(flight.slot_prompts.len(), 1);
        assert!(flight.slot_prompts.contains_key("origin"));
        assert_eq!(flight.slot_patterns.len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        std::fs::write(&path, DEMO).unwrap();
        let model = Model::load(&path).unwrap();
        assert_eq!(model.rule_count(), 4);

        let missing = Model::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ChatError::Io(_))));
    }
}
