//! Boolean keyword expression AST.

use std::collections::BTreeSet;
use std::fmt;

/// A parsed keyword expression.
///
/// Leaves are lower-cased keywords; interior nodes are the boolean
/// connectives. Evaluation is a plain recursive walk with short-circuiting,
/// keeping the hot path free of dynamic dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// True iff the keyword is present in the evaluation set.
    Keyword(String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Evaluate against the set of keywords observed for one event.
    pub fn evaluate(&self, present: &BTreeSet<String>) -> bool {
        match self {
            Expr::Keyword(k) => present.contains(k),
            Expr::And(l, r) => l.evaluate(present) && r.evaluate(present),
            Expr::Or(l, r) => l.evaluate(present) || r.evaluate(present),
            Expr::Not(inner) => !inner.evaluate(present),
        }
    }

    /// All leaf keywords of the expression, regardless of polarity.
    pub fn all_keywords(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_all(&mut out);
        out
    }

    fn collect_all(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Keyword(k) => {
                out.insert(k.clone());
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_all(out);
                r.collect_all(out);
            }
            Expr::Not(inner) => inner.collect_all(out),
        }
    }

    /// Keywords reachable without crossing a `Not` node.
    ///
    /// Only these go into the Aho-Corasick automaton. A keyword inside a
    /// NOT subtree contributes nothing here even if the same spelling also
    /// occurs positively elsewhere in the expression.
    pub fn positive_keywords(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_positive(&mut out);
        out
    }

    fn collect_positive(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Keyword(k) => {
                out.insert(k.clone());
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_positive(out);
                r.collect_positive(out);
            }
            // NOT subtrees are excluded from the automaton.
            Expr::Not(_) => {}
        }
    }
}

impl fmt::Display for Expr {
    /// Fully parenthesized form; `parse(print(e))` is structurally stable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Keyword(k) => f.write_str(k),
            Expr::And(l, r) => write!(f, "({l} AND {r})"),
            Expr::Or(l, r) => write!(f, "({l} OR {r})"),
            Expr::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}
