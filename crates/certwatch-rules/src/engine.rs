//! The compiled match engine: rules, automaton, and evaluation.

use std::collections::BTreeSet;

use aho_corasick::AhoCorasick;
use certwatch_types::{CertwatchError, Priority};

use crate::expr::Expr;

/// One compiled surveillance rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Unique name within the engine.
    pub name: String,
    /// Parsed keyword expression.
    pub expr: Expr,
    /// The expression exactly as written in the rule file.
    pub raw_keywords: String,
    pub priority: Priority,
    pub enabled: bool,
    /// Position after the priority sort; stable for equal priorities.
    pub order: usize,
    pub comment: String,
    /// Keywords appearing only under NOT, checked by substring scan at
    /// evaluation time instead of going into the automaton.
    not_keywords: Vec<String>,
}

impl Rule {
    /// Build a rule from its parts; `order` is assigned later by the engine.
    pub fn new(
        name: String,
        expr: Expr,
        raw_keywords: String,
        priority: Priority,
        enabled: bool,
        comment: String,
    ) -> Self {
        let positive = expr.positive_keywords();
        let not_keywords = expr
            .all_keywords()
            .into_iter()
            .filter(|k| !positive.contains(k))
            .collect();
        Self {
            name,
            expr,
            raw_keywords,
            priority,
            enabled,
            order: 0,
            comment,
            not_keywords,
        }
    }

    /// NOT-only keywords of this rule.
    pub fn not_keywords(&self) -> &[String] {
        &self.not_keywords
    }
}

/// The result of a rule firing on one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule_name: String,
    pub priority: Priority,
    /// The positive keywords the automaton observed for the event.
    pub keywords: Vec<String>,
}

/// An immutable compiled rule set.
///
/// Construction sorts the rules by priority (critical first, ties in
/// source order), unions their positive keywords, and compiles the union
/// into one case-insensitive Aho-Corasick automaton. Updates never mutate
/// an engine; a reload builds a fresh one and publishes it through
/// [`SharedEngine`](crate::shared::SharedEngine).
#[derive(Debug)]
pub struct RuleEngine {
    rules: Vec<Rule>,
    automaton: Option<AhoCorasick>,
    /// Automaton patterns, index-aligned with pattern ids.
    positive_keywords: Vec<String>,
    /// Union of NOT-only keywords across all rules.
    not_keywords: BTreeSet<String>,
}

impl RuleEngine {
    /// An engine with no rules; valid, and never matches.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            automaton: None,
            positive_keywords: Vec::new(),
            not_keywords: BTreeSet::new(),
        }
    }

    /// Compile a rule list into an engine.
    ///
    /// # Errors
    ///
    /// [`CertwatchError::NoKeywords`] if the rule list is non-empty but no
    /// rule contributes a positive keyword -- such an engine could never
    /// match anything and almost certainly indicates a rule-file mistake.
    pub fn build(mut rules: Vec<Rule>) -> Result<Self, CertwatchError> {
        if rules.is_empty() {
            return Ok(Self::empty());
        }

        // Stable sort keeps source order for equal priorities.
        rules.sort_by_key(|r| r.priority);
        for (i, rule) in rules.iter_mut().enumerate() {
            rule.order = i;
        }

        let mut positive: BTreeSet<String> = BTreeSet::new();
        let mut not_keywords: BTreeSet<String> = BTreeSet::new();
        for rule in &rules {
            positive.extend(rule.expr.positive_keywords());
            not_keywords.extend(rule.not_keywords.iter().cloned());
        }

        if positive.is_empty() {
            return Err(CertwatchError::NoKeywords);
        }

        let positive_keywords: Vec<String> = positive.into_iter().collect();
        let automaton = AhoCorasick::new(&positive_keywords).map_err(|e| {
            CertwatchError::ParseError(format!("failed to build keyword automaton: {e}"))
        })?;

        Ok(Self {
            rules,
            automaton: Some(automaton),
            positive_keywords,
            not_keywords,
        })
    }

    /// Scan domains for positive keywords.
    ///
    /// Returns every automaton keyword occurring as a substring of any
    /// lower-cased domain, deduplicated. NOT-keywords never appear here:
    /// they are not in the automaton at all.
    pub fn find(&self, domains: &[String]) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let Some(automaton) = &self.automaton else {
            return found;
        };

        for domain in domains {
            if domain.is_empty() {
                continue;
            }
            let lowered = domain.to_lowercase();
            for hit in automaton.find_overlapping_iter(&lowered) {
                found.insert(self.positive_keywords[hit.pattern().as_usize()].clone());
            }
        }
        found
    }

    /// Evaluate rules against the found positive keywords, highest priority
    /// first, returning the first rule whose expression is true.
    ///
    /// For each candidate rule, its NOT-keywords are reconstructed by a
    /// literal substring scan over the lower-cased domains and added to a
    /// rule-local copy of the keyword set, so `NOT` tests see exactly the
    /// terms present in this event.
    pub fn evaluate(
        &self,
        found: &BTreeSet<String>,
        domains: &[String],
    ) -> Option<RuleMatch> {
        if self.rules.is_empty() || found.is_empty() {
            return None;
        }

        let lowered: Vec<String> = domains.iter().map(|d| d.to_lowercase()).collect();

        for rule in &self.rules {
            if !rule.enabled {
                continue;
            }

            let mut present = found.clone();
            for not_kw in &rule.not_keywords {
                if lowered.iter().any(|d| d.contains(not_kw.as_str())) {
                    present.insert(not_kw.clone());
                }
            }

            if rule.expr.evaluate(&present) {
                return Some(RuleMatch {
                    rule_name: rule.name.clone(),
                    priority: rule.priority,
                    keywords: found.iter().cloned().collect(),
                });
            }
        }

        None
    }

    /// Rules in evaluation order (highest priority first).
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Distinct positive keywords recognized by the automaton.
    pub fn keyword_count(&self) -> usize {
        self.positive_keywords.len()
    }

    /// The automaton's keyword set.
    pub fn positive_keywords(&self) -> &[String] {
        &self.positive_keywords
    }

    /// Union of NOT-only keywords across all rules.
    pub fn not_keywords(&self) -> &BTreeSet<String> {
        &self.not_keywords
    }

    /// Number of enabled rules.
    pub fn enabled_count(&self) -> usize {
        self.rules.iter().filter(|r| r.enabled).count()
    }
}
