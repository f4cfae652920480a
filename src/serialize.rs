//! Canonical text serialization of the values fed to the hash function.
//!
//! Every digest produced by this crate is the hash of a string rendered with
//! the grammar below, so two implementations agreeing on this grammar produce
//! interoperable digests:
//!
//! - strings render as `"` delimited literals with `\` and `"` escaped,
//! - lists render as `[e1,e2,...]`,
//! - tuples render as `(e1,e2,...)`,
//! - integers render as decimal literals.
//!
//! A sequence of top-level terms is rendered comma separated without any
//! enclosing brackets, see [`serialize`].

use std::borrow::Cow;
use std::fmt::{self, Display, Write};

use itertools::Itertools;

/// A value in the canonical serialization grammar.
///
/// The derived ordering is only used to sort terms deterministically, e.g.
/// when grouping vertices into colour classes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    /// A decimal integer literal.
    Int(usize),
    /// A quoted string literal.
    Str(String),
    /// A bracketed list `[..]`.
    List(Vec<Term>),
    /// A parenthesised tuple `(..)`.
    Tuple(Vec<Term>),
}

impl Term {
    /// A string term.
    pub fn str(s: impl Into<String>) -> Self {
        Term::Str(s.into())
    }

    /// A list term.
    pub fn list(items: impl IntoIterator<Item = impl Into<Term>>) -> Self {
        Term::List(items.into_iter().map_into().collect())
    }

    /// A tuple term.
    pub fn tuple(items: impl IntoIterator<Item = impl Into<Term>>) -> Self {
        Term::Tuple(items.into_iter().map_into().collect())
    }
}

impl From<usize> for Term {
    fn from(i: usize) -> Self {
        Term::Int(i)
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Term::Str(s.to_owned())
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Term::Str(s)
    }
}

impl From<&String> for Term {
    fn from(s: &String) -> Self {
        Term::Str(s.clone())
    }
}

impl<A: Into<Term>, B: Into<Term>> From<(A, B)> for Term {
    fn from((a, b): (A, B)) -> Self {
        Term::Tuple(vec![a.into(), b.into()])
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Int(i) => write!(f, "{i}"),
            Term::Str(s) => {
                f.write_char('"')?;
                f.write_str(&escape(s))?;
                f.write_char('"')
            }
            Term::List(items) => write!(f, "[{}]", items.iter().format(",")),
            Term::Tuple(items) => write!(f, "({})", items.iter().format(",")),
        }
    }
}

/// Escapes backslashes and double quotes in a string literal.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['\\', '"']) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        if matches!(c, '\\' | '"') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Renders a sequence of terms separated by commas, without brackets.
///
/// # Example
///
/// ```
/// # use dihash::serialize::{serialize, Term};
/// let s = serialize(&[Term::from(3usize), Term::str("abc")]);
/// assert_eq!(s, r#"3,"abc""#);
/// ```
pub fn serialize<'a>(terms: impl IntoIterator<Item = &'a Term>) -> String {
    terms.into_iter().join(",")
}
