// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Clause AST for engine queries.
//!
//! Filter builders and the compiler produce [`Clause`] nodes; the wire
//! module renders them to the engine's JSON DSL as a final step.
//!
//! # Example
//!
//! ```rust
//! use search_sync::query::{BoolQuery, Clause};
//!
//! let clause = BoolQuery::new()
//!     .must(Clause::term("post_type.raw", "post"))
//!     .must_not(Clause::terms("post_id", vec![1.into(), 2.into()]))
//!     .into_clause();
//!
//! match clause {
//!     Clause::Bool(b) => {
//!         assert_eq!(b.must.len(), 1);
//!         assert_eq!(b.must_not.len(), 1);
//!     }
//!     _ => unreachable!(),
//! }
//! ```

use serde_json::Value;

/// Query AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Exact match on one value: `{"term": {field: value}}`
    Term { field: String, value: Value },
    /// Exact match on any of several values: `{"terms": {field: [..]}}`
    Terms { field: String, values: Vec<Value> },
    /// Range with optional bounds
    Range(RangeClause),
    /// Field presence
    Exists { field: String },
    /// Analyzed match on one field
    Match {
        field: String,
        query: Value,
        operator: Option<String>,
    },
    /// Analyzed match across several fields
    MultiMatch(MultiMatchClause),
    /// Regular expression match
    Regexp { field: String, pattern: String },
    /// Match every document
    MatchAll { boost: Option<f64> },
    /// Boolean composition
    Bool(BoolQuery),
    /// Random-score envelope around another query
    FunctionScore {
        query: Box<Clause>,
        random_score: bool,
        boost_mode: Option<String>,
    },
}

impl Clause {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Terms {
            field: field.into(),
            values,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists { field: field.into() }
    }

    pub fn match_query(field: impl Into<String>, query: impl Into<Value>) -> Self {
        Self::Match {
            field: field.into(),
            query: query.into(),
            operator: None,
        }
    }

    pub fn regexp(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Regexp {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn match_all() -> Self {
        Self::MatchAll { boost: None }
    }

    /// Wrap in a random-score function_score envelope.
    pub fn randomized(self) -> Self {
        Self::FunctionScore {
            query: Box::new(self),
            random_score: true,
            boost_mode: Some("sum".to_string()),
        }
    }

    /// Negate: `bool.must_not[self]`
    pub fn negate(self) -> Self {
        BoolQuery::new().must_not(self).into_clause()
    }

    /// Field name for leaf clauses, `None` for compound ones.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Term { field, .. }
            | Self::Terms { field, .. }
            | Self::Exists { field }
            | Self::Match { field, .. }
            | Self::Regexp { field, .. } => Some(field),
            Self::Range(r) => Some(&r.field),
            _ => None,
        }
    }
}

/// Range bounds; at least one should be set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeClause {
    pub field: String,
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

impl RangeClause {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn gt(mut self, v: impl Into<Value>) -> Self {
        self.gt = Some(v.into());
        self
    }

    #[must_use]
    pub fn gte(mut self, v: impl Into<Value>) -> Self {
        self.gte = Some(v.into());
        self
    }

    #[must_use]
    pub fn lt(mut self, v: impl Into<Value>) -> Self {
        self.lt = Some(v.into());
        self
    }

    #[must_use]
    pub fn lte(mut self, v: impl Into<Value>) -> Self {
        self.lte = Some(v.into());
        self
    }

    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }

    pub fn into_clause(self) -> Clause {
        Clause::Range(self)
    }
}

/// Multi-field match
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMatchClause {
    pub query: String,
    pub fields: Vec<String>,
    /// `phrase`, `best_fields`, ...
    pub kind: Option<String>,
    pub operator: Option<String>,
    pub boost: Option<f64>,
    pub fuzziness: Option<u32>,
}

impl MultiMatchClause {
    pub fn new(query: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            query: query.into(),
            fields,
            kind: None,
            operator: None,
            boost: None,
            fuzziness: None,
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    #[must_use]
    pub fn operator(mut self, op: impl Into<String>) -> Self {
        self.operator = Some(op.into());
        self
    }

    #[must_use]
    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    #[must_use]
    pub fn fuzziness(mut self, fuzziness: u32) -> Self {
        self.fuzziness = Some(fuzziness);
        self
    }

    pub fn into_clause(self) -> Clause {
        Clause::MultiMatch(self)
    }
}

/// Which `bool` array a clause lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
    Filter,
}

/// `bool` query. Empty arrays are left out on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoolQuery {
    pub must: Vec<Clause>,
    pub should: Vec<Clause>,
    pub must_not: Vec<Clause>,
    pub filter: Vec<Clause>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn must(mut self, clause: Clause) -> Self {
        self.must.push(clause);
        self
    }

    #[must_use]
    pub fn should(mut self, clause: Clause) -> Self {
        self.should.push(clause);
        self
    }

    #[must_use]
    pub fn must_not(mut self, clause: Clause) -> Self {
        self.must_not.push(clause);
        self
    }

    #[must_use]
    pub fn filter(mut self, clause: Clause) -> Self {
        self.filter.push(clause);
        self
    }

    /// Push into the array named by `occur`.
    pub fn push(&mut self, occur: Occur, clause: Clause) {
        match occur {
            Occur::Must => self.must.push(clause),
            Occur::Should => self.should.push(clause),
            Occur::MustNot => self.must_not.push(clause),
            Occur::Filter => self.filter.push(clause),
        }
    }

    /// Build a bool with every clause under one occurrence.
    pub fn with_all(occur: Occur, clauses: Vec<Clause>) -> Self {
        let mut b = Self::new();
        for c in clauses {
            b.push(occur, c);
        }
        b
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty() && self.filter.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.must.len() + self.should.len() + self.must_not.len() + self.filter.len()
    }

    pub fn into_clause(self) -> Clause {
        Clause::Bool(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_term_clause() {
        let clause = Clause::term("post_type.raw", "post");
        assert_eq!(
            clause,
            Clause::Term {
                field: "post_type.raw".to_string(),
                value: json!("post"),
            }
        );
        assert_eq!(clause.field(), Some("post_type.raw"));
    }

    #[test]
    fn test_negate_wraps_in_must_not() {
        match Clause::exists("meta.color").negate() {
            Clause::Bool(b) => {
                assert!(b.must.is_empty());
                assert_eq!(b.must_not, vec![Clause::exists("meta.color")]);
            }
            _ => panic!("Expected Bool node"),
        }
    }

    #[test]
    fn test_randomized_wraps_query() {
        match Clause::match_all().randomized() {
            Clause::FunctionScore { query, random_score, .. } => {
                assert!(random_score);
                assert_eq!(*query, Clause::match_all());
            }
            _ => panic!("Expected FunctionScore node"),
        }
    }

    #[test]
    fn test_bool_push_and_len() {
        let mut b = BoolQuery::new();
        assert!(b.is_empty());
        b.push(Occur::Must, Clause::exists("a"));
        b.push(Occur::Should, Clause::exists("b"));
        b.push(Occur::MustNot, Clause::exists("c"));
        assert_eq!(b.len(), 3);
        assert!(b.filter.is_empty());
    }

    #[test]
    fn test_with_all() {
        let b = BoolQuery::with_all(Occur::Should, vec![Clause::exists("a"), Clause::exists("b")]);
        assert_eq!(b.should.len(), 2);
        assert!(b.must.is_empty());
    }

    #[test]
    fn test_range_builder() {
        let r = RangeClause::new("meta.price.double").gte(10).lt(20);
        assert!(!r.is_unbounded());
        assert_eq!(r.gte, Some(json!(10)));
        assert!(r.gt.is_none());
        assert!(RangeClause::new("x").is_unbounded());
    }
}
