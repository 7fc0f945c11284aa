//! Rule language and match engine for certwatch.
//!
//! Rules are boolean keyword expressions (`AND` / `OR` / `NOT` with
//! parentheses) over substrings of certificate DNS names. The positive
//! keywords of all rules are compiled into one Aho-Corasick automaton;
//! NOT-keywords are deliberately kept out of the automaton and checked by
//! per-domain substring scan only when their owning rule is a candidate,
//! which is what keeps `NOT t.co` from poisoning domains like
//! `authenticator.com`.

pub mod engine;
pub mod expr;
pub mod idn;
pub mod loader;
pub mod parser;
pub mod shared;

pub use engine::{Rule, RuleEngine, RuleMatch};
pub use expr::Expr;
pub use loader::{compile_rules, load_rules, RuleConfig, RuleFile};
pub use parser::parse;
pub use shared::SharedEngine;
