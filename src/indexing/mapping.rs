// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index mapping and engine paths.
//!
//! The mapping declares every field the query compiler targets:
//!
//! ```text
//! post_title     text   + .raw keyword + .sortable (lowercase keyword)
//! post_type      text   + .raw keyword
//! post_status    keyword
//! meta.<key>     {value text+raw, raw, long, double, boolean, date, datetime, time}
//! terms.<tax>    {term_id, slug, name text+raw, parent}
//! date_terms.*   long
//! ```
//!
//! Engines before major version 7 nest mappings under a `post` type and
//! address documents as `<index>/post/<id>`; later ones use `<index>/_doc/<id>`.

use serde_json::{json, Map, Value};

use crate::config::IndexerConfig;

/// Mapping type used by engines that still require one.
pub const LEGACY_MAPPING_TYPE: &str = "post";

// Engine date formats matching `document::{DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT}`
const DATETIME_FORMAT_ENGINE: &str = "yyyy-MM-dd HH:mm:ss";
const DATE_FORMAT_ENGINE: &str = "yyyy-MM-dd";
const TIME_FORMAT_ENGINE: &str = "HH:mm:ss";

fn text_with_raw() -> Value {
    json!({
        "type": "text",
        "fields": { "raw": { "type": "keyword", "ignore_above": 10922 } }
    })
}

fn keyword() -> Value {
    json!({ "type": "keyword" })
}

fn long() -> Value {
    json!({ "type": "long" })
}

fn date(format: &str) -> Value {
    json!({ "type": "date", "format": format })
}

fn date_terms_properties() -> Value {
    let fields = [
        "year",
        "month",
        "week",
        "dayofyear",
        "day",
        "dayofweek",
        "dayofweek_iso",
        "hour",
        "minute",
        "second",
        "yearmonth",
    ];
    let properties: Map<String, Value> = fields.iter().map(|f| (f.to_string(), long())).collect();
    json!({ "type": "object", "properties": properties })
}

fn meta_template() -> Value {
    json!({
        "template_meta": {
            "path_match": "meta.*",
            "mapping": {
                "type": "object",
                "properties": {
                    "value": text_with_raw(),
                    "raw": keyword(),
                    "long": long(),
                    "double": { "type": "double" },
                    "boolean": { "type": "boolean" },
                    "date": date(DATE_FORMAT_ENGINE),
                    "datetime": date(DATETIME_FORMAT_ENGINE),
                    "time": date(TIME_FORMAT_ENGINE)
                }
            }
        }
    })
}

fn terms_template() -> Value {
    json!({
        "template_terms": {
            "path_match": "terms.*",
            "mapping": {
                "type": "object",
                "properties": {
                    "term_id": long(),
                    "slug": keyword(),
                    "name": text_with_raw(),
                    "parent": long()
                }
            }
        }
    })
}

fn post_properties() -> Value {
    let post_date = date(DATETIME_FORMAT_ENGINE);
    json!({
        "post_id": long(),
        "post_author": {
            "type": "object",
            "properties": { "id": long(), "login": keyword() }
        },
        "post_date": post_date,
        "post_date_gmt": post_date,
        "post_modified": post_date,
        "post_modified_gmt": post_date,
        "post_title": {
            "type": "text",
            "fields": {
                "raw": { "type": "keyword", "ignore_above": 10922 },
                "sortable": { "type": "keyword", "ignore_above": 10922, "normalizer": "lowerasciinormalizer" }
            }
        },
        "post_excerpt": { "type": "text" },
        "post_content": { "type": "text" },
        "post_status": keyword(),
        "post_name": text_with_raw(),
        "post_type": text_with_raw(),
        "post_mime_type": keyword(),
        "post_parent": long(),
        "menu_order": long(),
        "date_terms": date_terms_properties()
    })
}

/// Settings and mappings for a fresh index.
pub fn mapping_body(config: &IndexerConfig) -> Value {
    let mappings = json!({
        "date_detection": false,
        "dynamic_templates": [meta_template(), terms_template()],
        "properties": post_properties()
    });

    let mappings = if config.uses_mapping_types() {
        let mut typed = Map::new();
        typed.insert(LEGACY_MAPPING_TYPE.to_string(), mappings);
        Value::Object(typed)
    } else {
        mappings
    };

    json!({
        "settings": {
            "index.max_result_window": config.max_results_window,
            "analysis": {
                "analyzer": {
                    "default": {
                        "tokenizer": "standard",
                        "filter": ["lowercase", "asciifolding"]
                    }
                },
                "normalizer": {
                    "lowerasciinormalizer": {
                        "type": "custom",
                        "filter": ["lowercase", "asciifolding"]
                    }
                }
            }
        },
        "mappings": mappings
    })
}

/// Request paths for one index, by engine version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    index: String,
    legacy: bool,
}

impl EnginePaths {
    pub fn new(config: &IndexerConfig, scope: Option<&str>) -> Self {
        Self {
            index: config.index_for_scope(scope),
            legacy: config.uses_mapping_types(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn document(&self, id: u64) -> String {
        if self.legacy {
            format!("{}/{}/{}", self.index, LEGACY_MAPPING_TYPE, id)
        } else {
            format!("{}/_doc/{}", self.index, id)
        }
    }

    pub fn bulk(&self) -> String {
        self.endpoint("_bulk")
    }

    pub fn search(&self) -> String {
        self.endpoint("_search")
    }

    fn endpoint(&self, name: &str) -> String {
        if self.legacy {
            format!("{}/{}/{}", self.index, LEGACY_MAPPING_TYPE, name)
        } else {
            format!("{}/{}", self.index, name)
        }
    }
}
