// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Date range translator.
//!
//! Two shapes are supported:
//!
//! 1. Simple unit equality (`{year: 2024, month: 3}`) becomes one `term`
//!    per unit on the precomputed `date_terms.<unit>` fields.
//! 2. Compound clauses with `after`/`before` bounds become `range` clauses
//!    on a date column; unit constraints with a `compare` operator reuse
//!    the `date_terms.<unit>` paths.
//!
//! Nested groups are only combined with AND. An `OR` on a nested group is
//! logged and treated as AND.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::clause::{Clause, RangeClause};
use super::meta::{array_wrap, between, combine};
use super::request::{DateBound, DateClause, DateQuery, DateQueryItem, DateUnit, MetaCompare, Relation};
use super::RecursionTooDeep;
use crate::document::DATETIME_FORMAT;

/// Columns a range may target.
pub const DATE_COLUMNS: [&str; 4] = ["post_date", "post_date_gmt", "post_modified", "post_modified_gmt"];

const DEFAULT_COLUMN: &str = "post_date";

/// Translates [`DateQuery`] trees relative to a fixed "now".
#[derive(Debug, Clone)]
pub struct DateTranslator {
    now: NaiveDateTime,
    max_depth: usize,
}

impl DateTranslator {
    pub fn new(max_depth: usize) -> Self {
        Self {
            now: Utc::now().naive_utc(),
            max_depth,
        }
    }

    /// Pin "now" for relative bounds.
    #[must_use]
    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Clauses to AND into the result filter.
    pub fn build(&self, query: &DateQuery) -> Result<Vec<Clause>, RecursionTooDeep> {
        let column = resolve_column(query.column.as_deref(), DEFAULT_COLUMN);
        let mut clauses = unit_terms(&query.units);
        let items = self.build_items(query, &column, 0)?;

        match query.relation {
            Relation::And => clauses.extend(items.into_iter().flatten()),
            Relation::Or => {
                let alternatives: Vec<Clause> = items
                    .into_iter()
                    .filter_map(|group| combine(Relation::And, group))
                    .collect();
                if let Some(any) = combine(Relation::Or, alternatives) {
                    clauses.push(any);
                }
            }
        }
        Ok(clauses)
    }

    /// One clause list per item of `query`.
    fn build_items(&self, query: &DateQuery, column: &str, depth: usize) -> Result<Vec<Vec<Clause>>, RecursionTooDeep> {
        if depth > self.max_depth {
            return Err(RecursionTooDeep { depth });
        }

        let mut out = Vec::with_capacity(query.items.len());
        for item in &query.items {
            match item {
                DateQueryItem::Clause(clause) => {
                    let built = self.build_clause(clause, column);
                    if !built.is_empty() {
                        out.push(built);
                    }
                }
                DateQueryItem::Group(group) => {
                    if group.relation == Relation::Or {
                        warn!("OR relation on a nested date group is not supported, combining with AND");
                    }
                    let group_column = resolve_column(group.column.as_deref(), column);
                    let mut nested = unit_terms(&group.units);
                    nested.extend(self.build_items(group, &group_column, depth + 1)?.into_iter().flatten());
                    if let Some(c) = combine(Relation::And, nested) {
                        out.push(vec![c]);
                    }
                }
            }
        }
        Ok(out)
    }

    fn build_clause(&self, clause: &DateClause, column: &str) -> Vec<Clause> {
        let column = resolve_column(clause.column.as_deref(), column);
        let mut out = Vec::new();

        let after = clause.after.as_ref().and_then(|b| self.resolve_bound(b, !clause.inclusive));
        let before = clause.before.as_ref().and_then(|b| self.resolve_bound(b, clause.inclusive));
        if after.is_some() || before.is_some() {
            let mut range = RangeClause::new(column.clone());
            if let Some(a) = after {
                range = if clause.inclusive { range.gte(a) } else { range.gt(a) };
            }
            if let Some(b) = before {
                range = if clause.inclusive { range.lte(b) } else { range.lt(b) };
            }
            out.push(range.into_clause());
        }

        for (unit, value) in &clause.units {
            if let Some(c) = unit_clause(*unit, clause.compare, value) {
                out.push(c);
            }
        }
        out
    }

    /// Resolve a bound to an engine datetime string. Missing month/day in
    /// object bounds fill to the end of the period when `to_max` is set
    /// (exclusive `after`, inclusive `before`) and to its start otherwise.
    fn resolve_bound(&self, bound: &DateBound, to_max: bool) -> Option<String> {
        let dt = match bound {
            DateBound::Text(s) => crate::document::parse_datetime(s).or_else(|| parse_relative(s, self.now)),
            DateBound::Parts { year, month, day } => parts_to_datetime(*year, *month, *day, to_max),
        };
        match dt {
            Some(dt) => Some(dt.format(DATETIME_FORMAT).to_string()),
            None => {
                debug!(?bound, "Dropping unparseable date bound");
                None
            }
        }
    }
}

fn resolve_column(column: Option<&str>, fallback: &str) -> String {
    match column {
        Some(c) if DATE_COLUMNS.contains(&c) => c.to_string(),
        Some(c) => {
            debug!(column = %c, "Unknown date column, using {}", fallback);
            fallback.to_string()
        }
        None => fallback.to_string(),
    }
}

fn unit_path(unit: DateUnit) -> String {
    format!("date_terms.{}", unit.field())
}

fn unit_terms(units: &[(DateUnit, i64)]) -> Vec<Clause> {
    units
        .iter()
        .map(|(unit, n)| Clause::term(unit_path(*unit), *n))
        .collect()
}

fn unit_clause(unit: DateUnit, compare: Option<MetaCompare>, value: &Value) -> Option<Clause> {
    let path = unit_path(unit);
    let compare = compare.unwrap_or(if value.is_array() { MetaCompare::In } else { MetaCompare::Equals });
    let scalar = || match value {
        Value::Array(items) => items.first().cloned(),
        Value::Null => None,
        other => Some(other.clone()),
    };

    match compare {
        MetaCompare::Greater => Some(RangeClause::new(path).gt(scalar()?).into_clause()),
        MetaCompare::GreaterEq => Some(RangeClause::new(path).gte(scalar()?).into_clause()),
        MetaCompare::Less => Some(RangeClause::new(path).lt(scalar()?).into_clause()),
        MetaCompare::LessEq => Some(RangeClause::new(path).lte(scalar()?).into_clause()),
        MetaCompare::Between => between(path, value),
        MetaCompare::NotBetween => between(path, value).map(Clause::negate),
        MetaCompare::NotEquals | MetaCompare::NotIn => Some(Clause::terms(path, array_wrap(value)).negate()),
        MetaCompare::In => Some(Clause::terms(path, array_wrap(value))),
        MetaCompare::Equals => match value {
            Value::Array(_) => Some(Clause::terms(path, array_wrap(value))),
            Value::Null => None,
            other => Some(Clause::term(path, other.clone())),
        },
        other => {
            debug!(?other, unit = unit.field(), "Unsupported date comparator, dropping");
            None
        }
    }
}

fn parts_to_datetime(year: i32, month: Option<u32>, day: Option<u32>, to_max: bool) -> Option<NaiveDateTime> {
    let month = month.unwrap_or(if to_max { 12 } else { 1 });
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let day = match day {
        Some(d) => d,
        None if to_max => last_day_of_month(first)?,
        None => 1,
    };
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = if to_max {
        NaiveTime::from_hms_opt(23, 59, 59)?
    } else {
        NaiveTime::MIN
    };
    Some(date.and_time(time))
}

fn last_day_of_month(first: NaiveDate) -> Option<u32> {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|d| d.day())
}

/// Relative expressions: `now`, `today`, `yesterday`, `tomorrow`,
/// `N <unit> ago`, `-N <unit>`, `+N <unit>`.
pub fn parse_relative(input: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let s = input.trim().to_ascii_lowercase();
    let midnight = now.date().and_time(NaiveTime::MIN);
    match s.as_str() {
        "now" => return Some(now),
        "today" => return Some(midnight),
        "yesterday" => return midnight.checked_sub_signed(Duration::days(1)),
        "tomorrow" => return midnight.checked_add_signed(Duration::days(1)),
        _ => {}
    }

    let (body, sign) = match s.strip_suffix(" ago") {
        Some(rest) => (rest.trim(), -1),
        None => match s.strip_prefix('-') {
            Some(rest) => (rest.trim(), -1),
            None => (s.strip_prefix('+').unwrap_or(&s).trim(), 1),
        },
    };
    let mut parts = body.split_whitespace();
    let amount: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?.trim_end_matches('s');
    if parts.next().is_some() {
        return None;
    }
    let amount = amount.checked_mul(sign)?;

    let months = |n: i64| -> Option<NaiveDateTime> {
        let m = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
        if n < 0 {
            now.checked_sub_months(m)
        } else {
            now.checked_add_months(m)
        }
    };

    match unit {
        "second" | "sec" => now.checked_add_signed(Duration::try_seconds(amount)?),
        "minute" | "min" => now.checked_add_signed(Duration::try_minutes(amount)?),
        "hour" => now.checked_add_signed(Duration::try_hours(amount)?),
        "day" => now.checked_add_signed(Duration::try_days(amount)?),
        "week" => now.checked_add_signed(Duration::try_weeks(amount)?),
        "month" => months(amount),
        "year" => months(amount.checked_mul(12)?),
        _ => None,
    }
}
