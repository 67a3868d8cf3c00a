// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Maps engine search responses back to content-item stand-ins.

use serde_json::Value;
use tracing::debug;

use crate::document::Document;

/// One hit. `document` is `None` when `_source` was not returned or did
/// not deserialize.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: u64,
    pub score: Option<f64>,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResults {
    pub total: u64,
    pub hits: Vec<SearchHit>,
    pub aggregations: Option<Value>,
}

impl SearchResults {
    /// Read `hits.total` (integer or `{value}`), `hits.hits[]` and
    /// `aggregations`. Hits without a usable id are skipped.
    pub fn from_response(body: &Value) -> Self {
        let total = match &body["hits"]["total"] {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            Value::Object(obj) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
            _ => 0,
        };

        let hits = body["hits"]["hits"]
            .as_array()
            .map(|hits| hits.iter().filter_map(parse_hit).collect())
            .unwrap_or_default();

        Self {
            total,
            hits,
            aggregations: body.get("aggregations").cloned(),
        }
    }

    pub fn ids(&self) -> Vec<u64> {
        self.hits.iter().map(|h| h.id).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

fn parse_hit(hit: &Value) -> Option<SearchHit> {
    let source = hit.get("_source");
    let id = hit
        .get("_id")
        .and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            other => other.as_u64(),
        })
        .or_else(|| source.and_then(|s| s.get("post_id")).and_then(Value::as_u64));

    let Some(id) = id else {
        debug!("Skipping hit without id");
        return None;
    };

    let document = source.and_then(|s| match serde_json::from_value::<Document>(s.clone()) {
        Ok(doc) => Some(doc),
        Err(e) => {
            debug!(id, error = %e, "Hit source did not map to a document");
            None
        }
    });

    Some(SearchHit {
        id,
        score: hit.get("_score").and_then(Value::as_f64),
        document,
    })
}
