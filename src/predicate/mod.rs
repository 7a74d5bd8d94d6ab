//! Filter predicates over a single free variable.
//!
//! Predicates are kept as a small expression tree instead of query text so that
//! rebinding a filter from one variable to another (`n` → `m`) only touches
//! variable references. A property called `nx` or a literal `'n'` can never be
//! rewritten by accident.
//!
//! ## Modules
//!
//! - [`parser`]: text → [`Predicate`] (a Cypher `WHERE` subset, grammar in `predicate.pest`)
//! - [`rewriter`]: [`PredicateRewriter`]: bind a predicate to another variable, combine predicates
//! - [`eval`]: in-process evaluation with Cypher's three-valued logic
//!
//! Rendering back to Cypher is the [`std::fmt::Display`] implementation.

pub mod eval;
pub mod parser;
pub mod rewriter;

pub use eval::{value_key, Bindings, EntityRef};
pub use rewriter::{PredicateRewriter, EDGE_VARIABLE, NEIGHBOR_VARIABLE, NODE_VARIABLE};

use crate::error::Result;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Expression tree
// ============================================================================

/// Scalar literal appearing in a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Value-producing leaf of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Literal),
    /// `variable.key`
    Property { variable: String, key: String },
    /// A bare variable reference (the whole node or relationship).
    Variable(String),
    /// `[a, b, c]`
    List(Vec<Operand>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    StartsWith,
    EndsWith,
    Contains,
}

/// Boolean expression over one or more variables.
///
/// A filter supplied by a caller is written against one canonical variable
/// (`n` for nodes, `r` for relationships); composite predicates built by the
/// query builder may reference several.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Neutral predicate. "No filter" is represented by this variant.
    True,
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    StringMatch {
        subject: Operand,
        op: StringOp,
        pattern: Operand,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    In {
        operand: Operand,
        list: Operand,
    },
    /// `variable:Label` (relationship type for relationship variables)
    HasLabel {
        variable: String,
        label: String,
    },
    /// A bare boolean-valued operand such as `n.active`.
    Truthy(Operand),
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Default for Predicate {
    fn default() -> Self {
        Self::True
    }
}

impl Predicate {
    /// Parse a predicate from Cypher `WHERE` syntax. Blank input yields [`Predicate::True`].
    pub fn parse(input: &str) -> Result<Self> {
        parser::parse(input)
    }

    /// Whether this predicate is the neutral "always true" predicate.
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    /// Conjunction of `self` and `other`, flattening nested conjunctions and
    /// dropping neutral operands.
    pub fn and(self, other: Predicate) -> Predicate {
        PredicateRewriter::combine([self, other])
    }

    /// Replace every reference to variable `from` with `to`.
    ///
    /// Only variable references are rewritten: property keys, labels and
    /// literals are left untouched.
    pub fn rebind(&self, from: &str, to: &str) -> Predicate {
        match self {
            Self::True => Self::True,
            Self::Compare { left, op, right } => Self::Compare {
                left: left.rebind(from, to),
                op: *op,
                right: right.rebind(from, to),
            },
            Self::StringMatch {
                subject,
                op,
                pattern,
            } => Self::StringMatch {
                subject: subject.rebind(from, to),
                op: *op,
                pattern: pattern.rebind(from, to),
            },
            Self::IsNull { operand, negated } => Self::IsNull {
                operand: operand.rebind(from, to),
                negated: *negated,
            },
            Self::In { operand, list } => Self::In {
                operand: operand.rebind(from, to),
                list: list.rebind(from, to),
            },
            Self::HasLabel { variable, label } => Self::HasLabel {
                variable: rename(variable, from, to),
                label: label.clone(),
            },
            Self::Truthy(operand) => Self::Truthy(operand.rebind(from, to)),
            Self::Not(inner) => Self::Not(Box::new(inner.rebind(from, to))),
            Self::And(items) => Self::And(items.iter().map(|p| p.rebind(from, to)).collect()),
            Self::Or(items) => Self::Or(items.iter().map(|p| p.rebind(from, to)).collect()),
        }
    }

    /// Names of all variables referenced by this predicate.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::True => {}
            Self::Compare { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Self::StringMatch {
                subject, pattern, ..
            } => {
                subject.collect_variables(out);
                pattern.collect_variables(out);
            }
            Self::IsNull { operand, .. } | Self::Truthy(operand) => {
                operand.collect_variables(out)
            }
            Self::In { operand, list } => {
                operand.collect_variables(out);
                list.collect_variables(out);
            }
            Self::HasLabel { variable, .. } => {
                out.insert(variable.as_str());
            }
            Self::Not(inner) => inner.collect_variables(out),
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_variables(out);
                }
            }
        }
    }
}

impl Operand {
    fn rebind(&self, from: &str, to: &str) -> Operand {
        match self {
            Self::Literal(lit) => Self::Literal(lit.clone()),
            Self::Property { variable, key } => Self::Property {
                variable: rename(variable, from, to),
                key: key.clone(),
            },
            Self::Variable(variable) => Self::Variable(rename(variable, from, to)),
            Self::List(items) => Self::List(items.iter().map(|o| o.rebind(from, to)).collect()),
        }
    }

    fn collect_variables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Literal(_) => {}
            Self::Property { variable, .. } | Self::Variable(variable) => {
                out.insert(variable.as_str());
            }
            Self::List(items) => {
                for item in items {
                    item.collect_variables(out);
                }
            }
        }
    }
}

fn rename(variable: &str, from: &str, to: &str) -> String {
    if variable == from {
        to.to_string()
    } else {
        variable.to_string()
    }
}

impl FromStr for Predicate {
    type Err = crate::error::HypographError;

    fn from_str(s: &str) -> Result<Self> {
        parser::parse(s)
    }
}

// ============================================================================
// Cypher rendering
// ============================================================================

/// Render an identifier, backtick-quoting it unless it is a plain name.
pub fn escape_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Render a string literal in single quotes.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::String(s) => write!(f, "{}", quote_string(s)),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{}", lit),
            Self::Property { variable, key } => {
                write!(f, "{}.{}", escape_identifier(variable), escape_identifier(key))
            }
            Self::Variable(variable) => write!(f, "{}", escape_identifier(variable)),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}

impl fmt::Display for StringOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartsWith => write!(f, "STARTS WITH"),
            Self::EndsWith => write!(f, "ENDS WITH"),
            Self::Contains => write!(f, "CONTAINS"),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "true"),
            Self::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Self::StringMatch {
                subject,
                op,
                pattern,
            } => write!(f, "{} {} {}", subject, op, pattern),
            Self::IsNull { operand, negated } => {
                if *negated {
                    write!(f, "{} IS NOT NULL", operand)
                } else {
                    write!(f, "{} IS NULL", operand)
                }
            }
            Self::In { operand, list } => write!(f, "{} IN {}", operand, list),
            Self::HasLabel { variable, label } => {
                write!(f, "{}:{}", escape_identifier(variable), escape_identifier(label))
            }
            Self::Truthy(operand) => write!(f, "{}", operand),
            Self::Not(inner) => match inner.as_ref() {
                Self::And(_) | Self::Or(_) => write!(f, "NOT ({})", inner),
                other => write!(f, "NOT {}", other),
            },
            Self::And(items) => {
                if items.is_empty() {
                    return write!(f, "true");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " AND ")?;
                    }
                    match item {
                        Self::Or(_) => write!(f, "({})", item)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                Ok(())
            }
            Self::Or(items) => {
                if items.is_empty() {
                    return write!(f, "false");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " OR ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}
