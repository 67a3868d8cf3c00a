// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query compiler: [`QueryRequest`] → [`CompiledQuery`].

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::clause::{BoolQuery, Clause, MultiMatchClause};
use super::date::DateTranslator;
use super::meta::build_meta_filter;
use super::request::{MimeFilter, PageSize, ParentFilter, QueryRequest, SortOrder, ValueFilter};
use super::taxonomy::{build_tax_filter, slug_shorthand};
use super::wire::{self, WireError};
use crate::config::IndexerConfig;
use crate::hooks::HookRegistry;

/// Aggregation key used when the caller does not name one.
pub const DEFAULT_AGGREGATION_NAME: &str = "aggregation_name";

/// Who is asking. Privileged callers also see private statuses by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub privileged: bool,
}

impl CallerContext {
    pub fn privileged() -> Self {
        Self { privileged: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

/// Engine-native request body.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub from: usize,
    pub size: usize,
    pub sort: Vec<SortField>,
    pub query: Option<Clause>,
    pub post_filter: Option<Clause>,
    pub aggs: Option<Value>,
}

impl CompiledQuery {
    /// Render the `{from, size, sort, query, post_filter, aggs}` body.
    pub fn to_value(&self) -> Value {
        let mut body = Map::new();
        body.insert("from".into(), json!(self.from));
        body.insert("size".into(), json!(self.size));
        if !self.sort.is_empty() {
            let sort = self
                .sort
                .iter()
                .map(|s| json!({ s.field.as_str(): { "order": s.order.as_str() } }))
                .collect();
            body.insert("sort".into(), Value::Array(sort));
        }
        if let Some(ref query) = self.query {
            body.insert("query".into(), wire::to_value(query));
        }
        if let Some(ref filter) = self.post_filter {
            body.insert("post_filter".into(), wire::to_value(filter));
        }
        if let Some(ref aggs) = self.aggs {
            body.insert("aggs".into(), aggs.clone());
        }
        Value::Object(body)
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Parse a body produced by [`to_value`](Self::to_value).
    pub fn from_value(value: &Value) -> Result<Self, WireError> {
        let body = value.as_object().ok_or_else(|| WireError::Malformed {
            kind: "body".into(),
            reason: "expected an object".into(),
        })?;

        let number = |key: &str, default: usize| {
            body.get(key)
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(default)
        };

        let mut sort = Vec::new();
        if let Some(entries) = body.get("sort").and_then(Value::as_array) {
            for entry in entries {
                match entry {
                    Value::String(field) => sort.push(SortField::new(field.clone(), SortOrder::Desc)),
                    Value::Object(obj) if obj.len() == 1 => {
                        for (field, direction) in obj {
                            let order = direction
                                .get("order")
                                .and_then(Value::as_str)
                                .or_else(|| direction.as_str())
                                .map(SortOrder::parse)
                                .unwrap_or_default();
                            sort.push(SortField::new(field.clone(), order));
                        }
                    }
                    _ => {
                        return Err(WireError::Malformed {
                            kind: "sort".into(),
                            reason: "expected a field name or single-key object".into(),
                        })
                    }
                }
            }
        }

        Ok(Self {
            from: number("from", 0),
            size: number("size", 10),
            sort,
            query: body.get("query").map(wire::from_value).transpose()?,
            post_filter: body.get("post_filter").map(wire::from_value).transpose()?,
            aggs: body.get("aggs").cloned(),
        })
    }
}

enum SortPlan {
    Fields(Vec<SortField>),
    Random,
}

/// Compiles requests against one config.
#[derive(Clone)]
pub struct QueryCompiler {
    config: IndexerConfig,
    hooks: Option<Arc<HookRegistry>>,
}

impl QueryCompiler {
    pub fn new(config: IndexerConfig) -> Self {
        Self { config, hooks: None }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    #[tracing::instrument(skip(self, request), fields(search = request.search.is_some()))]
    pub fn compile(&self, request: &QueryRequest, ctx: &CallerContext) -> CompiledQuery {
        let mut query = self.text_query(request);

        let sort = match self.sort_plan(request) {
            SortPlan::Random => {
                query = Some(query.unwrap_or_else(Clause::match_all).randomized());
                Vec::new()
            }
            SortPlan::Fields(fields) => fields,
        };

        let filter = self.filters(request, ctx);
        let post_filter = (!filter.is_empty()).then(|| filter.into_clause());

        let size = match request.per_page {
            PageSize::Limit(n) => n.min(self.config.max_results_window),
            PageSize::Unbounded => self.config.max_results_window,
        };
        let from = match (request.offset, request.page) {
            (Some(offset), _) => offset,
            (None, Some(page)) if page > 1 => (page - 1).saturating_mul(size),
            _ => 0,
        };

        let aggs = request.aggregation.as_ref().map(|agg| {
            let name = agg.name.as_deref().unwrap_or(DEFAULT_AGGREGATION_NAME);
            let body = match (&post_filter, agg.use_filter) {
                (Some(filter), true) => json!({ "filter": wire::to_value(filter), "aggs": agg.aggs }),
                _ => agg.aggs.clone(),
            };
            json!({ name: body })
        });

        let mut compiled = CompiledQuery {
            from,
            size,
            sort,
            query,
            post_filter,
            aggs,
        };
        if let Some(ref hooks) = self.hooks {
            hooks.adjust_query(&mut compiled);
        }
        compiled
    }

    fn text_query(&self, request: &QueryRequest) -> Option<Clause> {
        let Some(term) = search_term(request) else {
            return request.match_all.then_some(Clause::MatchAll { boost: Some(1.0) });
        };

        let fields = request
            .search_fields
            .clone()
            .unwrap_or_else(|| self.config.search_fields.clone());

        let phrase = MultiMatchClause::new(term, fields.clone())
            .kind("phrase")
            .boost(self.config.phrase_boost);
        let all_words = MultiMatchClause::new(term, fields.clone())
            .operator("and")
            .boost(self.config.and_boost)
            .fuzziness(0);
        let fuzzy = MultiMatchClause::new(term, fields).fuzziness(self.config.fuzziness);

        Some(
            BoolQuery::new()
                .should(phrase.into_clause())
                .should(all_words.into_clause())
                .should(fuzzy.into_clause())
                .into_clause(),
        )
    }

    fn sort_plan(&self, request: &QueryRequest) -> SortPlan {
        let default_order = request.order.unwrap_or_default();

        if request.orderby.is_empty() {
            let field = if search_term(request).is_some() { "_score" } else { "post_date" };
            return SortPlan::Fields(vec![SortField::new(field, default_order)]);
        }

        if request.orderby.iter().any(|o| o.field.eq_ignore_ascii_case("rand")) {
            return SortPlan::Random;
        }

        let mut fields = Vec::with_capacity(request.orderby.len());
        for entry in &request.orderby {
            let order = entry.order.unwrap_or(default_order);
            let field = match entry.field.to_ascii_lowercase().as_str() {
                "relevance" => "_score".to_string(),
                "date" => "post_date".to_string(),
                "modified" => "post_modified".to_string(),
                "title" => "post_title.sortable".to_string(),
                "name" => "post_name.raw".to_string(),
                "id" => "post_id".to_string(),
                "type" => "post_type.raw".to_string(),
                "parent" => "post_parent".to_string(),
                "menu_order" => "menu_order".to_string(),
                "author" => "post_author.id".to_string(),
                "none" => continue,
                "meta_value" | "meta_value_num" => {
                    let Some(ref key) = request.meta_key else {
                        debug!(orderby = %entry.field, "Meta sort without meta_key, skipping");
                        continue;
                    };
                    let suffix = if entry.field.eq_ignore_ascii_case("meta_value_num") { "long" } else { "value" };
                    format!("meta.{}.{}", key, suffix)
                }
                _ => entry.field.clone(),
            };
            fields.push(SortField::new(field, order));
        }
        SortPlan::Fields(fields)
    }

    fn filters(&self, request: &QueryRequest, ctx: &CallerContext) -> BoolQuery {
        let mut filter = BoolQuery::new();

        if let Some(c) = request.post_type.as_ref().and_then(|f| value_filter("post_type.raw", f)) {
            filter.must.push(c);
        }

        let status = match request.post_status {
            Some(ref f) => value_filter("post_status", f),
            None => {
                let mut statuses = self.config.public_statuses.clone();
                if ctx.privileged {
                    statuses.extend(self.config.private_statuses.iter().cloned());
                }
                let f = match statuses.len() {
                    0 => ValueFilter::Any,
                    1 => ValueFilter::One(statuses.remove(0)),
                    _ => ValueFilter::Many(statuses),
                };
                value_filter("post_status", &f)
            }
        };
        if let Some(c) = status {
            filter.must.push(c);
        }

        if let Some(ref tax) = request.tax_query {
            let fragment = build_tax_filter(tax);
            filter.must.extend(fragment.must);
            filter.must_not.extend(fragment.must_not);
        }
        filter.must.extend(slug_shorthand("category", &request.category_name));
        filter.must.extend(slug_shorthand("post_tag", &request.tag));

        if !request.post_in.is_empty() {
            filter.must.push(Clause::terms("post_id", ids(&request.post_in)));
        }
        if !request.post_not_in.is_empty() {
            filter.must_not.push(Clause::terms("post_id", ids(&request.post_not_in)));
        }

        match request.post_mime_type {
            Some(MimeFilter::Prefix(ref prefix)) => {
                filter.must.push(Clause::regexp("post_mime_type", format!("{}.*", escape_regexp(prefix))));
            }
            Some(MimeFilter::Exact(ref types)) if !types.is_empty() => {
                let values = types.iter().map(|t| Value::String(t.clone())).collect();
                filter.must.push(Clause::terms("post_mime_type", values));
            }
            _ => {}
        }

        if let Some(ref meta) = request.meta_query {
            match build_meta_filter(meta, self.config.max_query_depth) {
                Ok(Some(c)) => filter.must.push(c),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Dropping meta filter"),
            }
        }

        if let Some(ref date) = request.date_query {
            match DateTranslator::new(self.config.max_query_depth).build(date) {
                Ok(clauses) => filter.must.extend(clauses),
                Err(e) => warn!(error = %e, "Dropping date filter"),
            }
        }

        if let Some(ParentFilter::Id(parent)) = request.post_parent {
            filter.must.push(Clause::term("post_parent", parent));
        }

        if !request.author_in.is_empty() {
            filter.must.push(Clause::terms("post_author.id", ids(&request.author_in)));
        }
        if !request.author_not_in.is_empty() {
            filter.must_not.push(Clause::terms("post_author.id", ids(&request.author_not_in)));
        }

        if !request.post_name_in.is_empty() {
            let names = request.post_name_in.iter().map(|n| Value::String(n.clone())).collect();
            filter.must.push(Clause::terms("post_name.raw", names));
        }

        filter
    }
}


/// The search term, if it has any non-blank content.
fn search_term(request: &QueryRequest) -> Option<&str> {
    request.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Backslash-escape the engine's regexp operators so `value` matches literally.
fn escape_regexp(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(
            c,
            '.' | '?' | '+' | '*' | '|' | '{' | '}' | '[' | ']' | '(' | ')' | '"' | '\\' | '#' | '@' | '&' | '<' | '>' | '~'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
fn value_filter(field: &str, filter: &ValueFilter) -> Option<Clause> {
    match filter {
        ValueFilter::Any => None,
        ValueFilter::One(v) => Some(Clause::term(field, v.as_str())),
        ValueFilter::Many(vs) => Some(Clause::terms(
            field,
            vs.iter().map(|v| Value::String(v.clone())).collect(),
        )),
    }
}

fn ids(list: &[u64]) -> Vec<Value> {
    list.iter().map(|id| json!(id)).collect()
}
