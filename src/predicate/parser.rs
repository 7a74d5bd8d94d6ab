//! Parser for the Cypher `WHERE` subset accepted as filters.
//!
//! The grammar lives in `predicate.pest`; this module turns the pest parse
//! tree into a [`Predicate`].

use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::{CompareOp, Literal, Operand, Predicate, StringOp};
use crate::error::{HypographError, Result};

#[derive(Parser)]
#[grammar = "src/predicate/predicate.pest"]
struct FilterParser;

fn error(position: usize, message: impl Into<String>) -> HypographError {
    HypographError::InvalidPredicate {
        position,
        message: message.into(),
    }
}

fn syntax_error(e: pest::error::Error<Rule>) -> HypographError {
    let position = match e.location {
        InputLocation::Pos(p) => p,
        InputLocation::Span((start, _)) => start,
    };
    error(position, e.variant.message())
}

fn missing(pair: &Pair<Rule>, what: &str) -> HypographError {
    error(pair.as_span().start(), format!("expected {}", what))
}

/// Parse a predicate. Blank input yields [`Predicate::True`].
pub fn parse(input: &str) -> Result<Predicate> {
    let filter = FilterParser::parse(Rule::filter, input)
        .map_err(syntax_error)?
        .next()
        .ok_or_else(|| error(0, "empty input"))?;

    match filter.into_inner().find(|p| p.as_rule() == Rule::or_expr) {
        Some(expr) => parse_or(expr),
        None => Ok(Predicate::True),
    }
}

// ============================================================================
// Boolean structure
// ============================================================================

fn parse_or(pair: Pair<Rule>) -> Result<Predicate> {
    let items = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::and_expr)
        .map(parse_and)
        .collect::<Result<Vec<_>>>()?;
    Ok(flatten(items, Predicate::Or))
}

fn parse_and(pair: Pair<Rule>) -> Result<Predicate> {
    let items = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::not_expr)
        .map(parse_not)
        .collect::<Result<Vec<_>>>()?;
    Ok(flatten(items, Predicate::And))
}

fn flatten(mut items: Vec<Predicate>, join: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if items.len() == 1 {
        items.remove(0)
    } else {
        join(items)
    }
}

fn parse_not(pair: Pair<Rule>) -> Result<Predicate> {
    let span = pair.clone();
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| missing(&span, "predicate"))?;
    match first.as_rule() {
        Rule::kw_not => {
            let operand = inner.next().ok_or_else(|| missing(&span, "predicate after NOT"))?;
            Ok(Predicate::Not(Box::new(parse_not(operand)?)))
        }
        Rule::paren => {
            let expr = first
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| missing(&first, "predicate inside parentheses"))?;
            parse_or(expr)
        }
        Rule::label_test => parse_label_test(first),
        Rule::condition => parse_condition(first),
        r => Err(error(first.as_span().start(), format!("unexpected {:?}", r))),
    }
}

fn parse_label_test(pair: Pair<Rule>) -> Result<Predicate> {
    let span = pair.clone();
    let mut inner = pair.into_inner();
    let variable = identifier(inner.next().ok_or_else(|| missing(&span, "variable"))?)?;
    let labels = inner
        .map(|label| {
            Ok(Predicate::HasLabel {
                variable: variable.clone(),
                label: identifier(label)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(flatten(labels, Predicate::And))
}

// ============================================================================
// Conditions
// ============================================================================

fn parse_condition(pair: Pair<Rule>) -> Result<Predicate> {
    let span = pair.clone();
    let mut inner = pair.into_inner();
    let left = parse_operand(inner.next().ok_or_else(|| missing(&span, "operand"))?)?;

    let Some(test) = inner.next() else {
        return Ok(match left {
            Operand::Literal(Literal::Boolean(true)) => Predicate::True,
            other => Predicate::Truthy(other),
        });
    };

    let mut parts = test.clone().into_inner();
    match test.as_rule() {
        Rule::comparison => {
            let op = parts.next().ok_or_else(|| missing(&test, "operator"))?;
            let right = parts.next().ok_or_else(|| missing(&test, "operand"))?;
            Ok(Predicate::Compare {
                left,
                op: compare_op(op.as_str()),
                right: parse_operand(right)?,
            })
        }
        Rule::null_test => Ok(Predicate::IsNull {
            operand: left,
            negated: parts.any(|p| p.as_rule() == Rule::kw_not),
        }),
        Rule::in_test => {
            let list = parts
                .find(|p| p.as_rule() == Rule::operand)
                .ok_or_else(|| missing(&test, "list"))?;
            Ok(Predicate::In {
                operand: left,
                list: parse_operand(list)?,
            })
        }
        Rule::string_test => {
            let op = parts.next().ok_or_else(|| missing(&test, "string operator"))?;
            let pattern = parts.next().ok_or_else(|| missing(&test, "operand"))?;
            Ok(Predicate::StringMatch {
                subject: left,
                op: string_op(op)?,
                pattern: parse_operand(pattern)?,
            })
        }
        r => Err(error(test.as_span().start(), format!("unexpected {:?}", r))),
    }
}

fn compare_op(text: &str) -> CompareOp {
    match text {
        "=" => CompareOp::Eq,
        "<" => CompareOp::Lt,
        "<=" => CompareOp::Le,
        ">" => CompareOp::Gt,
        ">=" => CompareOp::Ge,
        // "<>" and "!="
        _ => CompareOp::Ne,
    }
}

fn string_op(pair: Pair<Rule>) -> Result<StringOp> {
    let span = pair.clone();
    let first = pair
        .into_inner()
        .next()
        .ok_or_else(|| missing(&span, "string operator"))?;
    Ok(match first.as_rule() {
        Rule::kw_starts => StringOp::StartsWith,
        Rule::kw_ends => StringOp::EndsWith,
        _ => StringOp::Contains,
    })
}

// ============================================================================
// Operands
// ============================================================================

fn parse_operand(pair: Pair<Rule>) -> Result<Operand> {
    let span = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| missing(&span, "operand"))?;
    let position = inner.as_span().start();

    Ok(match inner.as_rule() {
        Rule::list => Operand::List(
            inner
                .into_inner()
                .map(parse_operand)
                .collect::<Result<Vec<_>>>()?,
        ),
        Rule::float => Operand::Literal(Literal::Float(
            inner
                .as_str()
                .parse()
                .map_err(|_| error(position, format!("invalid number '{}'", inner.as_str())))?,
        )),
        Rule::integer => Operand::Literal(Literal::Integer(
            inner
                .as_str()
                .parse()
                .map_err(|_| error(position, format!("invalid integer '{}'", inner.as_str())))?,
        )),
        Rule::string => {
            let body = inner.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Operand::Literal(Literal::String(unescape(body)))
        }
        Rule::boolean => {
            Operand::Literal(Literal::Boolean(inner.as_str().eq_ignore_ascii_case("true")))
        }
        Rule::null_literal => Operand::Literal(Literal::Null),
        Rule::reference => {
            let mut parts = inner.into_inner();
            let variable = identifier(
                parts
                    .next()
                    .ok_or_else(|| error(position, "expected variable"))?,
            )?;
            match parts.next() {
                Some(key) => Operand::Property {
                    variable,
                    key: identifier(key)?,
                },
                None => Operand::Variable(variable),
            }
        }
        r => return Err(error(position, format!("unexpected {:?}", r))),
    })
}

/// Text of an `identifier` or `key`, backtick quoting removed.
fn identifier(pair: Pair<Rule>) -> Result<String> {
    let span = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| missing(&span, "identifier"))?;
    Ok(match inner.as_rule() {
        Rule::quoted => inner
            .into_inner()
            .next()
            .map(|body| body.as_str().replace("``", "`"))
            .unwrap_or_default(),
        _ => inner.as_str().to_string(),
    })
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input_is_neutral() {
        assert_eq!(parse("").unwrap(), Predicate::True);
        assert_eq!(parse("   ").unwrap(), Predicate::True);
        assert_eq!(parse("true").unwrap(), Predicate::True);
    }

    #[test]
    fn test_simple_comparison() {
        let p = parse("n.age > 20").unwrap();
        assert_eq!(
            p,
            Predicate::Compare {
                left: Operand::Property {
                    variable: "n".into(),
                    key: "age".into()
                },
                op: CompareOp::Gt,
                right: Operand::Literal(Literal::Integer(20)),
            }
        );
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or() {
        let p = parse("n.a = 1 OR n.b = 2 AND n.c = 3").unwrap();
        match p {
            Predicate::Or(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1], Predicate::And(_)));
            }
            other => panic!("expected OR, got {:?}", other),
        }
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let p = parse("n.name starts with 'A' and not n.deleted").unwrap();
        assert_eq!(p.to_string(), "n.name STARTS WITH 'A' AND NOT n.deleted");
    }

    #[test]
    fn test_keyword_prefixed_names_are_identifiers() {
        let p = parse("n.index = 1 AND nothing.order > 2 AND n.in IS NULL").unwrap();
        assert_eq!(
            p.to_string(),
            "n.index = 1 AND nothing.order > 2 AND n.in IS NULL"
        );
    }

    #[test]
    fn test_is_null_in_and_lists() {
        let p = parse("n.x IS NOT NULL AND n.kind IN ['a', 'b'] AND n.score >= -1.5").unwrap();
        assert_eq!(
            p.to_string(),
            "n.x IS NOT NULL AND n.kind IN ['a', 'b'] AND n.score >= -1.5"
        );
    }

    #[test]
    fn test_label_tests() {
        let p = parse("n:Person:Employee").unwrap();
        assert_eq!(p.to_string(), "n:Person AND n:Employee");
    }

    #[test]
    fn test_quoted_identifier_and_not_equal_variants() {
        let p = parse("n.`first name` != \"Bob\"").unwrap();
        assert_eq!(p.to_string(), "n.`first name` <> 'Bob'");
        let q = parse("n.`odd``key` <> 'it\\'s'").unwrap();
        assert_eq!(
            q,
            Predicate::Compare {
                left: Operand::Property {
                    variable: "n".into(),
                    key: "odd`key".into()
                },
                op: CompareOp::Ne,
                right: Operand::Literal(Literal::String("it's".into())),
            }
        );
    }

    #[test]
    fn test_errors_report_position() {
        match parse("n.age >") {
            Err(HypographError::InvalidPredicate { position, .. }) => assert_eq!(position, 7),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(parse("n.name = 'unterminated").is_err());
        assert!(parse("(n.a = 1").is_err());
        assert!(parse("n.a = 1 n.b").is_err());
        assert!(parse("n.big = 99999999999999999999").is_err());
    }
}
