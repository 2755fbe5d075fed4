//! Predicate language of the in-memory source
//!
//! ```text
//! key == lit        key != lit        key > lit   key >= lit   key < lit   key <= lit
//! key == [a, b]     key != [a, b]     (membership)
//! key in [lo, hi]   key between [lo, hi]   key between lo and hi   (inclusive range)
//! key is null       key is not null
//! cond and cond     cond or cond      not cond    (cond)
//! ```
//!
//! `not` binds tightest, then `and`, then `or`. The `and` of a
//! `between lo and hi` range is part of the range.
//!
//! Literals are JSON scalars, single-quoted strings, `True`/`False`/`None`,
//! or bare words read as strings. A bare word may not contain whitespace or
//! operator characters; quote it instead. Strings never compare with numbers, and a
//! null or missing value satisfies no comparison.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::record::{Record, Scalar};

use super::errors::{SourceError, SourceResult};

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// A parsed raw predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        key: String,
        op: CompareOp,
        value: Scalar,
    },
    In {
        key: String,
        values: Vec<Scalar>,
        negated: bool,
    },
    Between {
        key: String,
        lo: Scalar,
        hi: Scalar,
    },
    IsNull {
        key: String,
        negated: bool,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

fn null_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\w+)\s+is\s+(not\s+)?null$").expect("static pattern compiles")
    })
}

fn bracket_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\w+)\s+(?:in|between)\s*\[(.*)\]$").expect("static pattern compiles")
    })
}

fn between_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\w+)\s+between\s+(.+?)\s+and\s+(.+)$").expect("static pattern compiles")
    })
}

/// A segment ending in an open `between` range, waiting for its `and hi`
fn open_between_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\bbetween\s+[^\s\[]").expect("static pattern compiles")
    })
}

fn binary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\w+)\s*(==|!=|>=|<=|>|<)\s*(.+)$").expect("static pattern compiles")
    })
}

impl Condition {
    /// Parses one raw predicate
    pub fn parse(expression: &str) -> SourceResult<Condition> {
        Self::parse_part(expression.trim(), expression)
    }

    fn parse_part(text: &str, expression: &str) -> SourceResult<Condition> {
        let syntax = |diagnostic: &str| SourceError::syntax(expression, diagnostic);

        if text.is_empty() {
            return Err(syntax("empty expression"));
        }

        let alternatives = split_top_level(text, Separator::Or);
        if alternatives.len() > 1 {
            return alternatives
                .into_iter()
                .map(|part| Self::parse_part(part.trim(), expression))
                .collect::<SourceResult<Vec<_>>>()
                .map(Condition::Any);
        }

        let conjuncts = split_top_level(text, Separator::And);
        if conjuncts.len() > 1 {
            return conjuncts
                .into_iter()
                .map(|part| Self::parse_part(part.trim(), expression))
                .collect::<SourceResult<Vec<_>>>()
                .map(Condition::All);
        }

        if let Some(rest) = strip_keyword(text, "not") {
            return Ok(Condition::Not(Box::new(Self::parse_part(rest, expression)?)));
        }

        if let Some(inner) = strip_parens(text) {
            return Self::parse_part(inner.trim(), expression);
        }

        if let Some(caps) = null_pattern().captures(text) {
            return Ok(Condition::IsNull {
                key: caps[1].to_string(),
                negated: caps.get(2).is_some(),
            });
        }

        if let Some(caps) = bracket_range_pattern().captures(text) {
            let bounds = split_top_level(&caps[2], Separator::Comma);
            if bounds.len() != 2 || bounds.iter().any(|b| b.trim().is_empty()) {
                return Err(syntax("range needs exactly two bounds"));
            }
            return Ok(Condition::Between {
                key: caps[1].to_string(),
                lo: literal(bounds[0], expression)?,
                hi: literal(bounds[1], expression)?,
            });
        }

        if let Some(caps) = between_pattern().captures(text) {
            return Ok(Condition::Between {
                key: caps[1].to_string(),
                lo: literal(&caps[2], expression)?,
                hi: literal(&caps[3], expression)?,
            });
        }

        if let Some(caps) = binary_pattern().captures(text) {
            let key = caps[1].to_string();
            let op = CompareOp::parse(&caps[2]).ok_or_else(|| syntax("unknown operator"))?;
            let rhs = caps[3].trim();

            if rhs.starts_with(['=', '<', '>', '!']) {
                return Err(syntax("malformed operator"));
            }

            if let Some(list) = rhs.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                let negated = match op {
                    CompareOp::Eq => false,
                    CompareOp::Ne => true,
                    _ => return Err(syntax("a list value needs == or !=")),
                };
                let values = split_top_level(list, Separator::Comma)
                    .into_iter()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| literal(v, expression))
                    .collect::<SourceResult<Vec<_>>>()?;
                return Ok(Condition::In {
                    key,
                    values,
                    negated,
                });
            }

            return Ok(Condition::Compare {
                key,
                op,
                value: literal(rhs, expression)?,
            });
        }

        Err(syntax("unrecognized expression"))
    }

    /// Column names the condition reads, in order of appearance
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Condition::Compare { key, .. }
            | Condition::In { key, .. }
            | Condition::Between { key, .. }
            | Condition::IsNull { key, .. } => vec![key.as_str()],
            Condition::All(parts) | Condition::Any(parts) => {
                parts.iter().flat_map(Condition::keys).collect()
            }
            Condition::Not(inner) => inner.keys(),
        }
    }

    /// Evaluates the condition against a record
    pub fn matches(&self, record: &Record) -> bool {
        let present = |key: &str| record.get(key).filter(|v| !v.is_null());

        match self {
            Condition::Compare { key, op, value } => present(key)
                .and_then(|actual| compare(actual, value))
                .map_or(false, |ordering| op.holds(ordering)),
            Condition::In {
                key,
                values,
                negated,
            } => present(key).map_or(false, |actual| {
                let found = values
                    .iter()
                    .any(|v| compare(actual, v) == Some(Ordering::Equal));
                found != *negated
            }),
            Condition::Between { key, lo, hi } => present(key).map_or(false, |actual| {
                matches!(compare(actual, lo), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(actual, hi), Some(Ordering::Less | Ordering::Equal))
            }),
            Condition::IsNull { key, negated } => present(key).is_none() != *negated,
            Condition::All(parts) => parts.iter().all(|p| p.matches(record)),
            Condition::Any(parts) => parts.iter().any(|p| p.matches(record)),
            Condition::Not(inner) => !inner.matches(record),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { key, op, value } => write!(f, "{} {} {}", key, op.as_str(), value),
            Condition::In {
                key,
                values,
                negated,
            } => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                let op = if *negated { "!=" } else { "==" };
                write!(f, "{} {} [{}]", key, op, values.join(", "))
            }
            Condition::Between { key, lo, hi } => write!(f, "{} between {} and {}", key, lo, hi),
            Condition::IsNull { key, negated: false } => write!(f, "{} is null", key),
            Condition::IsNull { key, negated: true } => write!(f, "{} is not null", key),
            Condition::All(parts) => {
                let parts: Vec<String> = parts.iter().map(|p| format!("({})", p)).collect();
                write!(f, "{}", parts.join(" and "))
            }
            Condition::Any(parts) => {
                let parts: Vec<String> = parts.iter().map(|p| format!("({})", p)).collect();
                write!(f, "{}", parts.join(" or "))
            }
            Condition::Not(inner) => write!(f, "not ({})", inner),
        }
    }
}

/// Parses one literal. Unquoted text that reads as a string must be a
/// single bare word.
fn literal(text: &str, expression: &str) -> SourceResult<Scalar> {
    let text = text.trim();
    let value = Scalar::parse_literal(text);
    let quoted = text.starts_with(['\'', '"']);
    let stray = |c: char| c.is_whitespace() || matches!(c, '=' | '<' | '>' | '!');
    if !quoted && matches!(value, Scalar::String(_)) && text.contains(stray) {
        return Err(SourceError::syntax(
            expression,
            format!("unquoted value `{}` is not a single word", text),
        ));
    }
    Ok(value)
}

/// Orders two non-null values when they are comparable.
///
/// Integers and floats compare numerically with each other; any other pair
/// of different kinds is incomparable.
fn compare(actual: &Scalar, expected: &Scalar) -> Option<Ordering> {
    match (actual, expected) {
        (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
        (Scalar::Int(a), Scalar::Float(b)) => (*a as f64).partial_cmp(b),
        (Scalar::Float(a), Scalar::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Scalar::Float(a), Scalar::Float(b)) => a.partial_cmp(b),
        (Scalar::String(a), Scalar::String(b)) => Some(a.cmp(b)),
        (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum Separator {
    Comma,
    And,
    Or,
}

/// Splits on a separator that is outside quotes and brackets
fn split_top_level(text: &str, separator: Separator) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;
    // the current segment's `between` already took its `and`
    let mut range_closed = false;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'[' | b'(' => depth += 1,
                b']' | b')' => depth -= 1,
                _ if depth == 0 => match separator {
                    Separator::Comma if b == b',' => {
                        parts.push(&text[start..i]);
                        start = i + 1;
                    }
                    Separator::Or if is_keyword_at(bytes, i, b"or") => {
                        parts.push(&text[start..i]);
                        start = i + 4;
                        i += 3;
                    }
                    Separator::And if is_keyword_at(bytes, i, b"and") => {
                        if !range_closed && open_between_pattern().is_match(&text[start..i]) {
                            range_closed = true;
                        } else {
                            parts.push(&text[start..i]);
                            range_closed = false;
                            start = i + 5;
                        }
                        i += 4;
                    }
                    _ => {}
                },
                _ => {}
            },
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

/// True if `keyword` surrounded by single whitespace (any case) starts at `i`
fn is_keyword_at(bytes: &[u8], i: usize, keyword: &[u8]) -> bool {
    let end = i + keyword.len() + 1;
    bytes.len() > end
        && bytes[i].is_ascii_whitespace()
        && bytes[i + 1..end].eq_ignore_ascii_case(keyword)
        && bytes[end].is_ascii_whitespace()
}

/// Strips a leading keyword followed by whitespace or `(`
fn strip_keyword<'t>(text: &'t str, keyword: &str) -> Option<&'t str> {
    let head = text.get(..keyword.len())?;
    let rest = &text[keyword.len()..];
    let boundary = rest.starts_with(|c: char| c.is_whitespace() || c == '(');
    (head.eq_ignore_ascii_case(keyword) && boundary).then(|| rest.trim_start())
}

/// Strips one pair of parentheses enclosing the whole text
fn strip_parens(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    // "(a) or (b)" is not enclosed as a whole
    let mut depth = 0i32;
    for b in inner.bytes() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(inner)
}
