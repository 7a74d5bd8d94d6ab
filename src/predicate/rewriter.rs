//! Variable rebinding and conjunction of filter predicates.

use super::Predicate;
use crate::error::Result;

/// Canonical variable node filters are written against.
pub const NODE_VARIABLE: &str = "n";
/// Variable the opposite endpoint of a traversal is bound to.
pub const NEIGHBOR_VARIABLE: &str = "m";
/// Canonical variable edge filters are written against.
pub const EDGE_VARIABLE: &str = "r";

/// Binds predicates written against a canonical variable to other variables.
#[derive(Debug, Clone)]
pub struct PredicateRewriter {
    canonical: String,
}

impl Default for PredicateRewriter {
    fn default() -> Self {
        Self::new(NODE_VARIABLE)
    }
}

impl PredicateRewriter {
    pub fn new(canonical: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
        }
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Rebind every reference to the canonical variable to `target`.
    pub fn bind(&self, predicate: &Predicate, target: &str) -> Predicate {
        predicate.rebind(&self.canonical, target)
    }

    /// Text-in, text-out variant of [`bind`](Self::bind).
    ///
    /// The input is parsed, rebound on the tree and rendered again, so
    /// `"n.nx = 1"` becomes `"m.nx = 1"`.
    pub fn bind_str(&self, predicate: &str, target: &str) -> Result<String> {
        let parsed = Predicate::parse(predicate)?;
        Ok(self.bind(&parsed, target).to_string())
    }

    /// Conjunction of all non-neutral predicates. An empty input (or one made
    /// only of neutral predicates) yields [`Predicate::True`].
    pub fn combine<I>(predicates: I) -> Predicate
    where
        I: IntoIterator<Item = Predicate>,
    {
        let mut items = Vec::new();
        for predicate in predicates {
            match predicate {
                Predicate::True => {}
                Predicate::And(inner) => {
                    items.extend(inner.into_iter().filter(|p| !p.is_true()))
                }
                other => items.push(other),
            }
        }
        match items.len() {
            0 => Predicate::True,
            1 => items.remove(0),
            _ => Predicate::And(items),
        }
    }
}
