// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Meta (custom field) filter builder.
//!
//! Field-path selection follows the typed projection written at index time:
//!
//! | comparator           | declared type            | path                  |
//! |----------------------|--------------------------|-----------------------|
//! | exists / not exists  | any                      | `meta.<key>`          |
//! | like / not like      | any                      | `meta.<key>.value`    |
//! | any                  | numeric/signed/unsigned  | `meta.<key>.long`     |
//! | any                  | decimal                  | `meta.<key>.double`   |
//! | any                  | date/datetime/time       | `meta.<key>.<type>`   |
//! | range, no type       | -                        | `meta.<key>.double`   |
//! | everything else      | -                        | `meta.<key>.raw`      |

use serde_json::Value;
use tracing::debug;

use super::clause::{BoolQuery, Clause, Occur, RangeClause};
use super::request::{MetaClause, MetaCompare, MetaQuery, MetaQueryItem, MetaType, Relation};
use super::RecursionTooDeep;

/// Pick the indexed field for a comparator/type pair.
pub fn meta_field_path(key: &str, compare: MetaCompare, value_type: Option<MetaType>) -> String {
    let suffix = match (compare, value_type) {
        (MetaCompare::Exists | MetaCompare::NotExists, _) => return format!("meta.{}", key),
        (MetaCompare::Like | MetaCompare::NotLike, _) => "value",
        (_, Some(MetaType::Numeric)) => "long",
        (_, Some(MetaType::Decimal)) => "double",
        (_, Some(MetaType::Date)) => "date",
        (_, Some(MetaType::DateTime)) => "datetime",
        (_, Some(MetaType::Time)) => "time",
        (c, None) if c.is_range() => "double",
        _ => "raw",
    };
    format!("meta.{}.{}", key, suffix)
}

/// Build clauses for one level of a meta query. The caller combines them
/// according to `query.relation`; nested groups come back pre-wrapped.
pub fn build_meta_clauses(query: &MetaQuery, depth: usize, max_depth: usize) -> Result<Vec<Clause>, RecursionTooDeep> {
    if depth > max_depth {
        return Err(RecursionTooDeep { depth });
    }

    let mut clauses = Vec::with_capacity(query.items.len());
    for item in &query.items {
        match item {
            MetaQueryItem::Clause(clause) => {
                if let Some(c) = build_meta_clause(clause) {
                    clauses.push(c);
                }
            }
            MetaQueryItem::Group(group) => {
                let nested = build_meta_clauses(group, depth + 1, max_depth)?;
                if let Some(c) = combine(group.relation, nested) {
                    clauses.push(c);
                }
            }
        }
    }
    Ok(clauses)
}

/// Build the whole meta filter as one clause wrapped by its top-level relation.
pub fn build_meta_filter(query: &MetaQuery, max_depth: usize) -> Result<Option<Clause>, RecursionTooDeep> {
    let clauses = build_meta_clauses(query, 0, max_depth)?;
    Ok(combine(query.relation, clauses))
}

/// Wrap sibling clauses in `bool.must` (AND) or `bool.should` (OR).
pub(crate) fn combine(relation: Relation, clauses: Vec<Clause>) -> Option<Clause> {
    if clauses.is_empty() {
        return None;
    }
    let occur = match relation {
        Relation::And => Occur::Must,
        Relation::Or => Occur::Should,
    };
    Some(BoolQuery::with_all(occur, clauses).into_clause())
}

/// Compile one predicate; `None` when it is malformed.
pub fn build_meta_clause(clause: &MetaClause) -> Option<Clause> {
    let path = meta_field_path(&clause.key, clause.compare, clause.value_type);

    match clause.compare {
        MetaCompare::Exists => Some(Clause::exists(path)),
        MetaCompare::NotExists => Some(Clause::exists(path).negate()),
        MetaCompare::Like | MetaCompare::NotLike => {
            let query = first_scalar(clause.value.as_ref()?)?;
            let c = Clause::match_query(path, query);
            Some(if clause.compare == MetaCompare::NotLike { c.negate() } else { c })
        }
        MetaCompare::Greater | MetaCompare::GreaterEq | MetaCompare::Less | MetaCompare::LessEq => {
            let bound = first_scalar(clause.value.as_ref()?)?;
            let range = RangeClause::new(path);
            let range = match clause.compare {
                MetaCompare::Greater => range.gt(bound),
                MetaCompare::GreaterEq => range.gte(bound),
                MetaCompare::Less => range.lt(bound),
                _ => range.lte(bound),
            };
            Some(range.into_clause())
        }
        MetaCompare::Between | MetaCompare::NotBetween => {
            let range = between(path, clause.value.as_ref()?)?;
            Some(if clause.compare == MetaCompare::NotBetween { range.negate() } else { range })
        }
        MetaCompare::NotEquals | MetaCompare::NotIn => {
            let values = array_wrap(clause.value.as_ref()?);
            Some(Clause::terms(path, values).negate())
        }
        MetaCompare::Equals | MetaCompare::In => {
            let values = array_wrap(clause.value.as_ref()?);
            Some(Clause::terms(path, values))
        }
    }
}

/// `gte`/`lte` range from exactly two values.
pub(crate) fn between(path: String, value: &Value) -> Option<Clause> {
    match value.as_array().map(Vec::as_slice) {
        Some([low, high]) => Some(RangeClause::new(path).gte(low.clone()).lte(high.clone()).into_clause()),
        _ => {
            debug!(field = %path, "Dropping BETWEEN without exactly two values");
            None
        }
    }
}

pub(crate) fn array_wrap(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn first_scalar(value: &Value) -> Option<Value> {
    match value {
        Value::Array(items) => items.first().cloned(),
        Value::Null => None,
        other => Some(other.clone()),
    }
}
