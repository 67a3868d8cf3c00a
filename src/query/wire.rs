// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Wire Translator
//!
//! Renders the clause AST to the engine's JSON query DSL and parses it back.
//!
//! # Engine Syntax Generated
//!
//! ```text
//! {"term": {"post_type.raw": "post"}}                  - Exact match
//! {"terms": {"post_id": [1, 2]}}                       - Any-of match
//! {"range": {"meta.price.double": {"gte": 10}}}        - Range
//! {"exists": {"field": "meta.color"}}                  - Presence
//! {"match": {"meta.color.value": "blue"}}              - Analyzed match
//! {"multi_match": {"query": "..", "fields": [..]}}     - Multi-field match
//! {"regexp": {"post_mime_type": "image.*"}}            - Regex
//! {"bool": {"must": [..], "must_not": [..]}}           - Boolean
//! {"function_score": {"query": .., "random_score": {}}} - Random order
//! ```

use serde_json::{json, Map, Value};
use thiserror::Error;

use super::clause::{BoolQuery, Clause, MultiMatchClause, RangeClause};

#[derive(Error, Debug, PartialEq)]
pub enum WireError {
    #[error("unknown clause type '{0}'")]
    UnknownClause(String),
    #[error("malformed '{kind}' clause: {reason}")]
    Malformed { kind: String, reason: String },
}

fn malformed(kind: &str, reason: impl Into<String>) -> WireError {
    WireError::Malformed {
        kind: kind.to_string(),
        reason: reason.into(),
    }
}

/// Render a clause to its engine JSON form.
pub fn to_value(clause: &Clause) -> Value {
    match clause {
        Clause::Term { field, value } => json!({ "term": { field.as_str(): value } }),
        Clause::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
        Clause::Range(range) => {
            let mut bounds = Map::new();
            for (name, bound) in [
                ("gt", &range.gt),
                ("gte", &range.gte),
                ("lt", &range.lt),
                ("lte", &range.lte),
            ] {
                if let Some(v) = bound {
                    bounds.insert(name.to_string(), v.clone());
                }
            }
            json!({ "range": { range.field.as_str(): bounds } })
        }
        Clause::Exists { field } => json!({ "exists": { "field": field } }),
        Clause::Match { field, query, operator } => match operator {
            Some(op) => json!({ "match": { field.as_str(): { "query": query, "operator": op } } }),
            None => json!({ "match": { field.as_str(): query } }),
        },
        Clause::MultiMatch(mm) => {
            let mut body = Map::new();
            body.insert("query".into(), Value::String(mm.query.clone()));
            body.insert("fields".into(), json!(mm.fields));
            if let Some(ref kind) = mm.kind {
                body.insert("type".into(), Value::String(kind.clone()));
            }
            if let Some(ref op) = mm.operator {
                body.insert("operator".into(), Value::String(op.clone()));
            }
            if let Some(boost) = mm.boost {
                body.insert("boost".into(), json!(boost));
            }
            if let Some(fuzziness) = mm.fuzziness {
                body.insert("fuzziness".into(), json!(fuzziness));
            }
            json!({ "multi_match": body })
        }
        Clause::Regexp { field, pattern } => json!({ "regexp": { field.as_str(): pattern } }),
        Clause::MatchAll { boost } => match boost {
            Some(b) => json!({ "match_all": { "boost": b } }),
            None => json!({ "match_all": {} }),
        },
        Clause::Bool(b) => json!({ "bool": bool_to_value(b) }),
        Clause::FunctionScore {
            query,
            random_score,
            boost_mode,
        } => {
            let mut body = Map::new();
            body.insert("query".into(), to_value(query));
            if *random_score {
                body.insert("random_score".into(), json!({}));
            }
            if let Some(ref mode) = boost_mode {
                body.insert("boost_mode".into(), Value::String(mode.clone()));
            }
            json!({ "function_score": body })
        }
    }
}

/// Render the inside of a `bool` (without the `bool` key).
pub fn bool_to_value(b: &BoolQuery) -> Value {
    let mut body = Map::new();
    for (name, clauses) in [
        ("must", &b.must),
        ("should", &b.should),
        ("must_not", &b.must_not),
        ("filter", &b.filter),
    ] {
        if !clauses.is_empty() {
            body.insert(
                name.to_string(),
                Value::Array(clauses.iter().map(to_value).collect()),
            );
        }
    }
    Value::Object(body)
}

/// Parse engine JSON back into a clause.
pub fn from_value(value: &Value) -> Result<Clause, WireError> {
    let (kind, body) = single_entry(value, "clause")?;
    match kind.as_str() {
        "term" => {
            let (field, v) = single_entry(body, "term")?;
            Ok(Clause::Term { field, value: v.clone() })
        }
        "terms" => {
            let (field, v) = single_entry(body, "terms")?;
            let values = v
                .as_array()
                .ok_or_else(|| malformed("terms", "values must be an array"))?
                .clone();
            Ok(Clause::Terms { field, values })
        }
        "range" => {
            let (field, bounds) = single_entry(body, "range")?;
            let bounds = bounds
                .as_object()
                .ok_or_else(|| malformed("range", "bounds must be an object"))?;
            Ok(Clause::Range(RangeClause {
                field,
                gt: bounds.get("gt").cloned(),
                gte: bounds.get("gte").cloned(),
                lt: bounds.get("lt").cloned(),
                lte: bounds.get("lte").cloned(),
            }))
        }
        "exists" => {
            let field = body
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("exists", "missing field"))?;
            Ok(Clause::exists(field))
        }
        "match" => {
            let (field, v) = single_entry(body, "match")?;
            match v.as_object() {
                Some(obj) if obj.contains_key("query") => Ok(Clause::Match {
                    field,
                    query: obj["query"].clone(),
                    operator: obj.get("operator").and_then(Value::as_str).map(String::from),
                }),
                _ => Ok(Clause::Match {
                    field,
                    query: v.clone(),
                    operator: None,
                }),
            }
        }
        "multi_match" => {
            let query = body
                .get("query")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("multi_match", "missing query"))?;
            let fields = body
                .get("fields")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default();
            Ok(Clause::MultiMatch(MultiMatchClause {
                query: query.to_string(),
                fields,
                kind: body.get("type").and_then(Value::as_str).map(String::from),
                operator: body.get("operator").and_then(Value::as_str).map(String::from),
                boost: body.get("boost").and_then(Value::as_f64),
                fuzziness: body
                    .get("fuzziness")
                    .and_then(Value::as_u64)
                    .and_then(|f| u32::try_from(f).ok()),
            }))
        }
        "regexp" => {
            let (field, v) = single_entry(body, "regexp")?;
            let pattern = v
                .as_str()
                .ok_or_else(|| malformed("regexp", "pattern must be a string"))?;
            Ok(Clause::regexp(field, pattern))
        }
        "match_all" => Ok(Clause::MatchAll {
            boost: body.get("boost").and_then(Value::as_f64),
        }),
        "bool" => Ok(Clause::Bool(bool_from_value(body)?)),
        "function_score" => {
            let query = match body.get("query") {
                Some(q) => from_value(q)?,
                None => Clause::match_all(),
            };
            Ok(Clause::FunctionScore {
                query: Box::new(query),
                random_score: body.get("random_score").is_some(),
                boost_mode: body.get("boost_mode").and_then(Value::as_str).map(String::from),
            })
        }
        other => Err(WireError::UnknownClause(other.to_string())),
    }
}

/// Parse the inside of a `bool`.
pub fn bool_from_value(body: &Value) -> Result<BoolQuery, WireError> {
    let obj = body
        .as_object()
        .ok_or_else(|| malformed("bool", "body must be an object"))?;
    let mut b = BoolQuery::new();
    for (name, target) in [
        ("must", &mut b.must),
        ("should", &mut b.should),
        ("must_not", &mut b.must_not),
        ("filter", &mut b.filter),
    ] {
        match obj.get(name) {
            Some(Value::Array(items)) => {
                for item in items {
                    target.push(from_value(item)?);
                }
            }
            // engines accept a lone clause in place of a one-element array
            Some(single @ Value::Object(_)) => target.push(from_value(single)?),
            Some(_) => return Err(malformed("bool", format!("'{}' must be an array", name))),
            None => {}
        }
    }
    Ok(b)
}

fn single_entry<'a>(value: &'a Value, kind: &str) -> Result<(String, &'a Value), WireError> {
    let obj = value
        .as_object()
        .ok_or_else(|| malformed(kind, "expected an object"))?;
    let mut iter = obj.iter();
    match (iter.next(), iter.next()) {
        (Some((k, v)), None) => Ok((k.clone(), v)),
        _ => Err(malformed(kind, "expected exactly one key")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_renders() {
        assert_eq!(
            to_value(&Clause::term("post_type.raw", "post")),
            json!({"term": {"post_type.raw": "post"}})
        );
    }

    #[test]
    fn test_terms_renders_array() {
        assert_eq!(
            to_value(&Clause::terms("meta.color.raw", vec![json!("blue")])),
            json!({"terms": {"meta.color.raw": ["blue"]}})
        );
    }

    #[test]
    fn test_range_renders_only_set_bounds() {
        let clause = RangeClause::new("post_date").gte("2024-01-01 00:00:00").into_clause();
        assert_eq!(
            to_value(&clause),
            json!({"range": {"post_date": {"gte": "2024-01-01 00:00:00"}}})
        );
    }

    #[test]
    fn test_bool_omits_empty_arrays() {
        let clause = BoolQuery::new().must(Clause::exists("a")).into_clause();
        assert_eq!(to_value(&clause), json!({"bool": {"must": [{"exists": {"field": "a"}}]}}));
    }

    #[test]
    fn test_match_with_operator() {
        let clause = Clause::Match {
            field: "post_title".into(),
            query: json!("hello world"),
            operator: Some("and".into()),
        };
        let value = to_value(&clause);
        assert_eq!(value["match"]["post_title"]["operator"], "and");
        assert_eq!(from_value(&value).unwrap(), clause);
    }

    #[test]
    fn test_function_score_random() {
        let value = to_value(&Clause::match_all().randomized());
        assert_eq!(value["function_score"]["random_score"], json!({}));
        assert_eq!(value["function_score"]["query"], json!({"match_all": {}}));
    }

    #[test]
    fn test_parse_nested_bool() {
        let value = json!({
            "bool": {
                "must": [
                    {"terms": {"post_id": [1, 2]}},
                    {"bool": {"should": [{"term": {"a": 1}}, {"exists": {"field": "b"}}]}}
                ],
                "must_not": [{"regexp": {"post_mime_type": "image.*"}}]
            }
        });
        let clause = from_value(&value).unwrap();
        assert_eq!(to_value(&clause), value);
    }

    #[test]
    fn test_parse_lone_clause_in_bool() {
        let clause = from_value(&json!({"bool": {"must": {"term": {"a": 1}}}})).unwrap();
        match clause {
            Clause::Bool(b) => assert_eq!(b.must.len(), 1),
            _ => panic!("Expected Bool node"),
        }
    }

    #[test]
    fn test_multi_match_roundtrip() {
        let clause = MultiMatchClause::new("hello", vec!["post_title".into()])
            .kind("phrase")
            .boost(4.0)
            .into_clause();
        let text = serde_json::to_string(&to_value(&clause)).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(from_value(&parsed).unwrap(), clause);
    }

    #[test]
    fn test_unknown_clause_errors() {
        assert_eq!(
            from_value(&json!({"geo_shape": {}})),
            Err(WireError::UnknownClause("geo_shape".into()))
        );
        assert!(from_value(&json!({"term": {"a": 1}, "terms": {}})).is_err());
        assert!(from_value(&json!("nope")).is_err());
    }
}
