use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Value – a single header value
// ---------------------------------------------------------------------------

/// A dynamically-typed header value covering the FITS value grammar.
///
/// Untagged serde representation so JSON round-trips look like plain
/// scalars: `"BIAS"`, `42`, `1.5`, `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Bool(_) => 0,
                Int(_) => 1,
                Float(_) => 2,
                Str(_) => 3,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "T"),
            Value::Bool(false) => write!(f, "F"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl Value {
    /// Interpret the value as `f64` where that is lossless enough for
    /// pipeline use: floats, integers, and numeric strings all qualify.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(i) => Some(*i as f64),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(_) => None,
        }
    }

    /// Interpret the value as `i64`; integral floats are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Str(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Interpret the value as a string slice (strings only).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// Card – keyword + value + optional comment
// ---------------------------------------------------------------------------

/// One header card. Keywords are stored uppercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub keyword: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Header – ordered card collection
// ---------------------------------------------------------------------------

/// Keywords that may repeat; `set` never replaces these, it appends.
const REPEATABLE: [&str; 2] = ["HISTORY", "COMMENT"];

/// An ordered, FITS-flavored header.
///
/// Insertion order is preserved (and survives serde round-trips). Lookups
/// are case-insensitive. Setting an existing keyword replaces its value in
/// place; `HISTORY` and `COMMENT` accumulate instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Header::default()
    }

    /// Number of cards, repeated HISTORY/COMMENT entries included.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// All cards in insertion order.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Look up a keyword (case-insensitive). For repeatable keywords the
    /// first entry is returned; use [`Header::history`] for the full list.
    pub fn get(&self, keyword: &str) -> Option<&Value> {
        let keyword = keyword.to_ascii_uppercase();
        self.cards
            .iter()
            .find(|c| c.keyword == keyword)
            .map(|c| &c.value)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(Value::as_str)
    }

    pub fn get_int(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(Value::as_i64)
    }

    pub fn get_float(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(Value::as_f64)
    }

    /// Typed lookup that fails with [`Error::MissingKeyword`] /
    /// [`Error::WrongType`] for pipeline code that cannot proceed without it.
    pub fn require_str(&self, keyword: &str) -> Result<&str> {
        let value = self
            .get(keyword)
            .ok_or_else(|| Error::missing_keyword(keyword))?;
        value.as_str().ok_or_else(|| Error::WrongType {
            keyword: keyword.to_ascii_uppercase(),
            expected: "a string",
        })
    }

    pub fn require_float(&self, keyword: &str) -> Result<f64> {
        let value = self
            .get(keyword)
            .ok_or_else(|| Error::missing_keyword(keyword))?;
        value.as_f64().ok_or_else(|| Error::WrongType {
            keyword: keyword.to_ascii_uppercase(),
            expected: "a number",
        })
    }

    pub fn require_int(&self, keyword: &str) -> Result<i64> {
        let value = self
            .get(keyword)
            .ok_or_else(|| Error::missing_keyword(keyword))?;
        value.as_i64().ok_or_else(|| Error::WrongType {
            keyword: keyword.to_ascii_uppercase(),
            expected: "an integer",
        })
    }

    /// Set a keyword. Replaces in place, preserving the card's position;
    /// repeatable keywords (HISTORY, COMMENT) always append.
    pub fn set<V: Into<Value>>(&mut self, keyword: &str, value: V) {
        self.set_card(keyword, value.into(), None);
    }

    /// Like [`Header::set`] with a card comment.
    pub fn set_with_comment<V: Into<Value>>(&mut self, keyword: &str, value: V, comment: &str) {
        self.set_card(keyword, value.into(), Some(comment.to_string()));
    }

    fn set_card(&mut self, keyword: &str, value: Value, comment: Option<String>) {
        let keyword = keyword.to_ascii_uppercase();
        if !REPEATABLE.contains(&keyword.as_str()) {
            if let Some(card) = self.cards.iter_mut().find(|c| c.keyword == keyword) {
                card.value = value;
                if comment.is_some() {
                    card.comment = comment;
                }
                return;
            }
        }
        self.cards.push(Card {
            keyword,
            value,
            comment,
        });
    }

    /// Remove a keyword, returning its value. For repeatable keywords this
    /// removes every entry and returns the first.
    pub fn remove(&mut self, keyword: &str) -> Option<Value> {
        let keyword = keyword.to_ascii_uppercase();
        let first = self
            .cards
            .iter()
            .find(|c| c.keyword == keyword)
            .map(|c| c.value.clone());
        self.cards.retain(|c| c.keyword != keyword);
        first
    }

    /// Append a HISTORY entry.
    pub fn add_history<S: Into<String>>(&mut self, text: S) {
        self.cards.push(Card {
            keyword: "HISTORY".to_string(),
            value: Value::Str(text.into()),
            comment: None,
        });
    }

    /// All HISTORY entries, oldest first.
    pub fn history(&self) -> Vec<&str> {
        self.cards
            .iter()
            .filter(|c| c.keyword == "HISTORY")
            .filter_map(|c| c.value.as_str())
            .collect()
    }
}
