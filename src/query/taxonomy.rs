// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Taxonomy predicates on `terms.<taxonomy>.<field>`.

use serde_json::Value;
use tracing::debug;

use super::clause::{BoolQuery, Clause};
use super::request::{Relation, TaxClause, TaxOperator, TaxQuery};

fn tax_path(taxonomy: &str, clause: &TaxClause) -> String {
    format!("terms.{}.{}", taxonomy, clause.field.path())
}

/// Compile a taxonomy query into a fragment to merge into the result
/// filter. Exclusions land in `must_not`; with an `OR` relation the
/// positive predicates are grouped in one `bool.should`.
pub fn build_tax_filter(query: &TaxQuery) -> BoolQuery {
    let mut positive = Vec::new();
    let mut negative = Vec::new();

    for clause in &query.clauses {
        if clause.taxonomy.is_empty() {
            debug!("Skipping tax predicate without taxonomy");
            continue;
        }
        let path = tax_path(&clause.taxonomy, clause);
        match clause.operator {
            TaxOperator::Exists => positive.push(Clause::exists(format!("terms.{}", clause.taxonomy))),
            TaxOperator::NotExists => negative.push(Clause::exists(format!("terms.{}", clause.taxonomy))),
            _ if clause.terms.is_empty() => {
                debug!(taxonomy = %clause.taxonomy, "Skipping tax predicate with no terms");
            }
            TaxOperator::In => positive.push(Clause::terms(path, clause.terms.clone())),
            TaxOperator::NotIn => negative.push(Clause::terms(path, clause.terms.clone())),
            TaxOperator::And => {
                let all = clause
                    .terms
                    .iter()
                    .fold(BoolQuery::new(), |b, term| b.must(Clause::term(path.clone(), term.clone())));
                positive.push(all.into_clause());
            }
        }
    }

    let mut fragment = BoolQuery::new();
    match query.relation {
        Relation::And => {
            fragment.must = positive;
            fragment.must_not = negative;
        }
        Relation::Or if !positive.is_empty() || !negative.is_empty() => {
            // an OR across an exclusion keeps the exclusion inside its own bool
            let mut any = BoolQuery::new();
            any.should = positive;
            any.should.extend(negative.into_iter().map(Clause::negate));
            fragment.must.push(any.into_clause());
        }
        Relation::Or => {}
    }
    fragment
}

/// Slug shorthand (`category_name`, `tag`) as an `IN` predicate.
pub fn slug_shorthand(taxonomy: &str, slugs: &[String]) -> Option<Clause> {
    if slugs.is_empty() {
        return None;
    }
    let values = slugs.iter().map(|s| Value::String(s.clone())).collect();
    Some(Clause::terms(format!("terms.{}.slug", taxonomy), values))
}
