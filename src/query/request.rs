// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Abstract query requests.
//!
//! A [`QueryRequest`] is a bag of optional filter dimensions. It can be
//! built field by field or parsed leniently from host-style JSON args with
//! [`QueryRequest::from_value`]; malformed pieces are logged and dropped
//! rather than rejected, since callers routinely pass half-built specs.

use serde_json::Value;
use tracing::debug;

/// `AND` / `OR` combination of sibling predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Relation {
    #[default]
    And,
    Or,
}

impl Relation {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("or") {
            Relation::Or
        } else {
            Relation::And
        }
    }

    fn from_object(obj: &serde_json::Map<String, Value>) -> Self {
        obj.get("relation")
            .and_then(Value::as_str)
            .map(Relation::parse)
            .unwrap_or_default()
    }
}

/// A restriction that may be "any", one value, or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueFilter {
    Any,
    One(String),
    Many(Vec<String>),
}

impl ValueFilter {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if s.eq_ignore_ascii_case("any") => Some(ValueFilter::Any),
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(ValueFilter::One(s.clone())),
            Value::Array(items) => {
                let values: Vec<String> = items.iter().filter_map(scalar_string).collect();
                if values.iter().any(|v| v.eq_ignore_ascii_case("any")) {
                    Some(ValueFilter::Any)
                } else if values.is_empty() {
                    None
                } else {
                    Some(ValueFilter::Many(values))
                }
            }
            _ => None,
        }
    }
}

/// Mime-type restriction: a string is a prefix match, an array is exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeFilter {
    Prefix(String),
    Exact(Vec<String>),
}

/// Parent restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentFilter {
    Any,
    Id(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One requested ordering, before alias translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub order: Option<SortOrder>,
}

impl OrderBy {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: None,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    Limit(usize),
    Unbounded,
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Limit(10)
    }
}

/// Facet request attached under `aggs`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSpec {
    pub name: Option<String>,
    pub aggs: Value,
    /// Nest the result filters under the aggregation
    pub use_filter: bool,
}

// ---------------------------------------------------------------------------
// Meta predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCompare {
    Equals,
    NotEquals,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
    Exists,
    NotExists,
}

impl MetaCompare {
    /// Parse a comparator; unknown ones fall back to `=`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "=" => MetaCompare::Equals,
            "!=" | "<>" => MetaCompare::NotEquals,
            ">" => MetaCompare::Greater,
            ">=" => MetaCompare::GreaterEq,
            "<" => MetaCompare::Less,
            "<=" => MetaCompare::LessEq,
            "LIKE" => MetaCompare::Like,
            "NOT LIKE" => MetaCompare::NotLike,
            "IN" => MetaCompare::In,
            "NOT IN" => MetaCompare::NotIn,
            "BETWEEN" => MetaCompare::Between,
            "NOT BETWEEN" => MetaCompare::NotBetween,
            "EXISTS" => MetaCompare::Exists,
            "NOT EXISTS" => MetaCompare::NotExists,
            other => {
                debug!(compare = %other, "Unknown comparator, treating as '='");
                MetaCompare::Equals
            }
        }
    }

    #[must_use]
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            MetaCompare::Greater
                | MetaCompare::GreaterEq
                | MetaCompare::Less
                | MetaCompare::LessEq
                | MetaCompare::Between
                | MetaCompare::NotBetween
        )
    }
}

/// Declared value type of a meta predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaType {
    Numeric,
    Decimal,
    Date,
    DateTime,
    Time,
    Char,
    Binary,
}

impl MetaType {
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        // DECIMAL(10,2) and friends
        let base = upper.split('(').next().unwrap_or("");
        match base {
            "NUMERIC" | "SIGNED" | "UNSIGNED" => Some(MetaType::Numeric),
            "DECIMAL" => Some(MetaType::Decimal),
            "DATE" => Some(MetaType::Date),
            "DATETIME" => Some(MetaType::DateTime),
            "TIME" => Some(MetaType::Time),
            "CHAR" => Some(MetaType::Char),
            "BINARY" => Some(MetaType::Binary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetaClause {
    pub key: String,
    pub value: Option<Value>,
    pub compare: MetaCompare,
    pub value_type: Option<MetaType>,
}

impl MetaClause {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            compare: MetaCompare::Equals,
            value_type: None,
        }
    }

    pub fn exists(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            compare: MetaCompare::Exists,
            value_type: None,
        }
    }

    #[must_use]
    pub fn compare(mut self, compare: MetaCompare) -> Self {
        self.compare = compare;
        self
    }

    #[must_use]
    pub fn typed(mut self, value_type: MetaType) -> Self {
        self.value_type = Some(value_type);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaQueryItem {
    Clause(MetaClause),
    Group(MetaQuery),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetaQuery {
    pub relation: Relation,
    pub items: Vec<MetaQueryItem>,
}

impl MetaQuery {
    pub fn new(relation: Relation) -> Self {
        Self {
            relation,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn clause(mut self, clause: MetaClause) -> Self {
        self.items.push(MetaQueryItem::Clause(clause));
        self
    }

    #[must_use]
    pub fn group(mut self, group: MetaQuery) -> Self {
        self.items.push(MetaQueryItem::Group(group));
        self
    }

    /// Parse host-style meta query JSON. Entries with no `key` and no
    /// nested group are skipped.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(entries) => Self {
                relation: Relation::And,
                items: entries.iter().filter_map(parse_meta_entry).collect(),
            },
            Value::Object(obj) if obj.contains_key("key") => Self {
                relation: Relation::And,
                items: parse_meta_entry(value).into_iter().collect(),
            },
            Value::Object(obj) => Self {
                relation: Relation::from_object(obj),
                items: obj
                    .iter()
                    .filter(|(k, _)| k.as_str() != "relation")
                    .filter_map(|(_, v)| parse_meta_entry(v))
                    .collect(),
            },
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn parse_meta_entry(entry: &Value) -> Option<MetaQueryItem> {
    let obj = match entry {
        Value::Object(obj) => obj,
        Value::Array(_) => {
            let group = MetaQuery::from_value(entry);
            return (!group.is_empty()).then_some(MetaQueryItem::Group(group));
        }
        _ => {
            debug!("Skipping non-object meta query entry");
            return None;
        }
    };

    let Some(key) = obj.get("key").and_then(scalar_string) else {
        let nested = obj.values().any(|v| v.is_object() || v.is_array());
        if nested {
            let group = MetaQuery::from_value(entry);
            return (!group.is_empty()).then_some(MetaQueryItem::Group(group));
        }
        debug!("Skipping meta query entry without key");
        return None;
    };

    let value = obj.get("value").filter(|v| !v.is_null()).cloned();
    let compare = match obj.get("compare").and_then(Value::as_str) {
        Some(c) => MetaCompare::parse(c),
        None if value.is_none() => MetaCompare::Exists,
        None if value.as_ref().is_some_and(Value::is_array) => MetaCompare::In,
        None => MetaCompare::Equals,
    };
    let value_type = obj.get("type").and_then(Value::as_str).and_then(MetaType::parse);

    Some(MetaQueryItem::Clause(MetaClause {
        key,
        value,
        compare,
        value_type,
    }))
}

// ---------------------------------------------------------------------------
// Taxonomy predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaxField {
    #[default]
    TermId,
    Name,
    Slug,
}

impl TaxField {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => TaxField::Name,
            "slug" => TaxField::Slug,
            _ => TaxField::TermId,
        }
    }

    /// Sub-field under `terms.<taxonomy>`.
    pub fn path(&self) -> &'static str {
        match self {
            TaxField::TermId => "term_id",
            TaxField::Name => "name.raw",
            TaxField::Slug => "slug",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaxOperator {
    #[default]
    In,
    NotIn,
    And,
    Exists,
    NotExists,
}

impl TaxOperator {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOT IN" => TaxOperator::NotIn,
            "AND" => TaxOperator::And,
            "EXISTS" => TaxOperator::Exists,
            "NOT EXISTS" => TaxOperator::NotExists,
            _ => TaxOperator::In,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxClause {
    pub taxonomy: String,
    pub terms: Vec<Value>,
    pub field: TaxField,
    pub operator: TaxOperator,
}

impl TaxClause {
    pub fn new(taxonomy: impl Into<String>, terms: Vec<Value>) -> Self {
        Self {
            taxonomy: taxonomy.into(),
            terms,
            field: TaxField::TermId,
            operator: TaxOperator::In,
        }
    }

    #[must_use]
    pub fn field(mut self, field: TaxField) -> Self {
        self.field = field;
        self
    }

    #[must_use]
    pub fn operator(mut self, operator: TaxOperator) -> Self {
        self.operator = operator;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaxQuery {
    pub relation: Relation,
    pub clauses: Vec<TaxClause>,
}

impl TaxQuery {
    pub fn new(relation: Relation) -> Self {
        Self {
            relation,
            clauses: Vec::new(),
        }
    }

    #[must_use]
    pub fn clause(mut self, clause: TaxClause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn from_value(value: &Value) -> Self {
        let (relation, entries): (Relation, Vec<&Value>) = match value {
            Value::Array(items) => (Relation::And, items.iter().collect()),
            Value::Object(obj) if obj.contains_key("taxonomy") => (Relation::And, vec![value]),
            Value::Object(obj) => (
                Relation::from_object(obj),
                obj.iter()
                    .filter(|(k, _)| k.as_str() != "relation")
                    .map(|(_, v)| v)
                    .collect(),
            ),
            _ => (Relation::And, Vec::new()),
        };

        let clauses = entries
            .into_iter()
            .filter_map(|entry| {
                let obj = entry.as_object()?;
                let Some(taxonomy) = obj.get("taxonomy").and_then(Value::as_str) else {
                    debug!("Skipping tax query entry without taxonomy");
                    return None;
                };
                let terms = match obj.get("terms") {
                    Some(Value::Array(items)) => items.clone(),
                    Some(v) if !v.is_null() => vec![v.clone()],
                    _ => Vec::new(),
                };
                Some(TaxClause {
                    taxonomy: taxonomy.to_string(),
                    terms,
                    field: obj.get("field").and_then(Value::as_str).map(TaxField::parse).unwrap_or_default(),
                    operator: obj
                        .get("operator")
                        .and_then(Value::as_str)
                        .map(TaxOperator::parse)
                        .unwrap_or_default(),
                })
            })
            .collect();

        Self { relation, clauses }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Date predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DateUnit {
    Year,
    Month,
    Week,
    DayOfYear,
    Day,
    DayOfWeek,
    DayOfWeekIso,
    Hour,
    Minute,
    Second,
    YearMonth,
}

impl DateUnit {
    pub const ALL: [DateUnit; 11] = [
        DateUnit::Year,
        DateUnit::Month,
        DateUnit::Week,
        DateUnit::DayOfYear,
        DateUnit::Day,
        DateUnit::DayOfWeek,
        DateUnit::DayOfWeekIso,
        DateUnit::Hour,
        DateUnit::Minute,
        DateUnit::Second,
        DateUnit::YearMonth,
    ];

    /// Accepts both field names and the host's query-var aliases.
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "year" => Some(DateUnit::Year),
            "month" | "monthnum" => Some(DateUnit::Month),
            "week" | "w" => Some(DateUnit::Week),
            "dayofyear" => Some(DateUnit::DayOfYear),
            "day" => Some(DateUnit::Day),
            "dayofweek" => Some(DateUnit::DayOfWeek),
            "dayofweek_iso" => Some(DateUnit::DayOfWeekIso),
            "hour" => Some(DateUnit::Hour),
            "minute" => Some(DateUnit::Minute),
            "second" => Some(DateUnit::Second),
            "yearmonth" | "m" => Some(DateUnit::YearMonth),
            _ => None,
        }
    }

    /// Field under `date_terms`.
    pub fn field(&self) -> &'static str {
        match self {
            DateUnit::Year => "year",
            DateUnit::Month => "month",
            DateUnit::Week => "week",
            DateUnit::DayOfYear => "dayofyear",
            DateUnit::Day => "day",
            DateUnit::DayOfWeek => "dayofweek",
            DateUnit::DayOfWeekIso => "dayofweek_iso",
            DateUnit::Hour => "hour",
            DateUnit::Minute => "minute",
            DateUnit::Second => "second",
            DateUnit::YearMonth => "yearmonth",
        }
    }
}

/// An `after`/`before` bound: a date string or a `{year, month, day}` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateBound {
    Text(String),
    Parts {
        year: i32,
        month: Option<u32>,
        day: Option<u32>,
    },
}

impl DateBound {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(DateBound::Text(s.clone())),
            Value::Object(obj) => {
                let year = obj.get("year").and_then(as_i64)?;
                Some(DateBound::Parts {
                    year: i32::try_from(year).ok()?,
                    month: obj.get("month").and_then(as_i64).and_then(|m| u32::try_from(m).ok()),
                    day: obj.get("day").and_then(as_i64).and_then(|d| u32::try_from(d).ok()),
                })
            }
            _ => None,
        }
    }
}

/// One compound date clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DateClause {
    pub column: Option<String>,
    pub after: Option<DateBound>,
    pub before: Option<DateBound>,
    pub inclusive: bool,
    pub compare: Option<MetaCompare>,
    /// Unit constraints; values may be arrays for IN/BETWEEN
    pub units: Vec<(DateUnit, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateQueryItem {
    Clause(DateClause),
    Group(DateQuery),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DateQuery {
    pub relation: Relation,
    pub column: Option<String>,
    /// Simple per-unit equality
    pub units: Vec<(DateUnit, i64)>,
    pub items: Vec<DateQueryItem>,
}

impl DateQuery {
    /// Simple equality on calendar units, e.g. year + month.
    pub fn units(units: Vec<(DateUnit, i64)>) -> Self {
        Self {
            units,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn clause(mut self, clause: DateClause) -> Self {
        self.items.push(DateQueryItem::Clause(clause));
        self
    }

    #[must_use]
    pub fn group(mut self, group: DateQuery) -> Self {
        self.items.push(DateQueryItem::Group(group));
        self
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(entries) => Self {
                items: entries.iter().filter_map(parse_date_entry).collect(),
                ..Default::default()
            },
            Value::Object(obj) if is_compound_date_clause(obj) => Self {
                items: parse_date_entry(value).into_iter().collect(),
                ..Default::default()
            },
            Value::Object(obj) => {
                let mut query = Self {
                    relation: Relation::from_object(obj),
                    column: obj.get("column").and_then(Value::as_str).map(String::from),
                    ..Default::default()
                };
                for (k, v) in obj {
                    if let Some(unit) = DateUnit::parse(k) {
                        match as_i64(v) {
                            Some(n) => query.units.push((unit, n)),
                            None => debug!(unit = %k, "Skipping non-numeric date unit"),
                        }
                    } else if v.is_object() || v.is_array() {
                        if let Some(item) = parse_date_entry(v) {
                            query.items.push(item);
                        }
                    }
                }
                query
            }
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.items.is_empty()
    }
}

fn is_compound_date_clause(obj: &serde_json::Map<String, Value>) -> bool {
    obj.contains_key("after") || obj.contains_key("before") || obj.contains_key("compare")
}

fn parse_date_entry(entry: &Value) -> Option<DateQueryItem> {
    match entry {
        Value::Array(_) => {
            let group = DateQuery::from_value(entry);
            (!group.is_empty()).then_some(DateQueryItem::Group(group))
        }
        Value::Object(obj) if is_compound_date_clause(obj) => {
            let clause = DateClause {
                column: obj.get("column").and_then(Value::as_str).map(String::from),
                after: obj.get("after").and_then(DateBound::from_value),
                before: obj.get("before").and_then(DateBound::from_value),
                inclusive: obj.get("inclusive").is_some_and(truthy),
                compare: obj.get("compare").and_then(Value::as_str).map(MetaCompare::parse),
                units: obj
                    .iter()
                    .filter_map(|(k, v)| DateUnit::parse(k).map(|u| (u, v.clone())))
                    .collect(),
            };
            Some(DateQueryItem::Clause(clause))
        }
        Value::Object(_) => {
            let group = DateQuery::from_value(entry);
            (!group.is_empty()).then_some(DateQueryItem::Group(group))
        }
        _ => {
            debug!("Skipping non-object date query entry");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Abstract search/listing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub search: Option<String>,
    pub search_fields: Option<Vec<String>>,
    pub match_all: bool,
    pub post_type: Option<ValueFilter>,
    pub post_status: Option<ValueFilter>,
    pub post_mime_type: Option<MimeFilter>,
    pub tax_query: Option<TaxQuery>,
    pub category_name: Vec<String>,
    pub tag: Vec<String>,
    pub meta_query: Option<MetaQuery>,
    pub date_query: Option<DateQuery>,
    pub post_in: Vec<u64>,
    pub post_not_in: Vec<u64>,
    pub post_parent: Option<ParentFilter>,
    pub author_in: Vec<u64>,
    pub author_not_in: Vec<u64>,
    pub post_name_in: Vec<String>,
    pub orderby: Vec<OrderBy>,
    pub order: Option<SortOrder>,
    pub meta_key: Option<String>,
    pub offset: Option<usize>,
    pub page: Option<usize>,
    pub per_page: PageSize,
    pub aggregation: Option<AggregationSpec>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Parse host-style query args leniently.
    pub fn from_value(value: &Value) -> Self {
        let mut req = Self::default();
        let Some(args) = value.as_object() else {
            debug!("Query args are not an object, using an empty request");
            return req;
        };

        req.search = args
            .get("s")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);
        req.search_fields = args.get("search_fields").map(string_list).filter(|f| !f.is_empty());
        req.match_all = args.get("match_all").is_some_and(truthy);
        req.post_type = args.get("post_type").and_then(ValueFilter::from_value);
        req.post_status = args.get("post_status").and_then(ValueFilter::from_value);
        req.post_mime_type = match args.get("post_mime_type") {
            Some(Value::String(s)) if !s.is_empty() => Some(MimeFilter::Prefix(s.clone())),
            Some(v @ Value::Array(_)) => Some(MimeFilter::Exact(string_list(v))).filter(|m| match m {
                MimeFilter::Exact(list) => !list.is_empty(),
                MimeFilter::Prefix(_) => true,
            }),
            _ => None,
        };
        req.tax_query = args.get("tax_query").map(TaxQuery::from_value).filter(|q| !q.is_empty());
        req.category_name = args.get("category_name").map(comma_list).unwrap_or_default();
        req.tag = args.get("tag").map(comma_list).unwrap_or_default();
        req.meta_query = args.get("meta_query").map(MetaQuery::from_value).filter(|q| !q.is_empty());

        // date_query plus top-level unit shorthands (year, monthnum, m, w, ...)
        let mut date = args.get("date_query").map(DateQuery::from_value).unwrap_or_default();
        for (k, v) in args {
            if let Some(unit) = DateUnit::parse(k) {
                if let Some(n) = as_i64(v).filter(|n| *n != 0) {
                    date.units.push((unit, n));
                }
            }
        }
        req.date_query = Some(date).filter(|d| !d.is_empty());

        req.post_in = args.get("post__in").map(id_list).unwrap_or_default();
        req.post_not_in = args.get("post__not_in").map(id_list).unwrap_or_default();
        req.post_parent = match args.get("post_parent") {
            Some(Value::String(s)) if s.eq_ignore_ascii_case("any") => Some(ParentFilter::Any),
            Some(v) => as_i64(v).and_then(|n| u64::try_from(n).ok()).map(ParentFilter::Id),
            None => None,
        };
        req.author_in = args.get("author__in").map(id_list).unwrap_or_default();
        if let Some(author) = args.get("author").and_then(as_i64).and_then(|n| u64::try_from(n).ok()) {
            req.author_in.push(author);
        }
        req.author_not_in = args.get("author__not_in").map(id_list).unwrap_or_default();
        req.post_name_in = args.get("post_name__in").map(string_list).unwrap_or_default();

        req.order = args.get("order").and_then(Value::as_str).map(SortOrder::parse);
        req.orderby = match args.get("orderby") {
            Some(Value::String(s)) => s.split_whitespace().map(OrderBy::new).collect(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(field, dir)| OrderBy {
                    field: field.clone(),
                    order: dir.as_str().map(SortOrder::parse),
                })
                .collect(),
            Some(v @ Value::Array(_)) => string_list(v).into_iter().map(OrderBy::new).collect(),
            _ => Vec::new(),
        };
        req.meta_key = args.get("meta_key").and_then(Value::as_str).map(String::from);

        req.offset = args.get("offset").and_then(as_i64).and_then(|n| usize::try_from(n).ok());
        req.page = args.get("paged").and_then(as_i64).and_then(|n| usize::try_from(n).ok());
        req.per_page = match args.get("posts_per_page").and_then(as_i64) {
            Some(-1) => PageSize::Unbounded,
            Some(n) if n > 0 => PageSize::Limit(usize::try_from(n).unwrap_or(usize::MAX)),
            _ => PageSize::default(),
        };
        if args.get("nopaging").is_some_and(truthy) {
            req.per_page = PageSize::Unbounded;
        }

        req.aggregation = args.get("aggs").and_then(|aggs| {
            let obj = aggs.as_object()?;
            let body = obj.get("aggs")?.clone();
            Some(AggregationSpec {
                name: obj.get("name").and_then(Value::as_str).map(String::from),
                aggs: body,
                use_filter: obj.get("use-filter").or_else(|| obj.get("use_filter")).is_some_and(truthy),
            })
        });

        req
    }
}

// ---------------------------------------------------------------------------
// Lenient scalar helpers
// ---------------------------------------------------------------------------

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        _ => false,
    }
}

fn string_list(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}

fn comma_list(v: &Value) -> Vec<String> {
    string_list(v)
        .iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn id_list(v: &Value) -> Vec<u64> {
    let items: Vec<&Value> = match v {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .filter_map(as_i64)
        .filter_map(|n| u64::try_from(n).ok())
        .collect()
}
