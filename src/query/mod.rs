// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Compilation
//!
//! Turns abstract listing/search requests into engine query bodies.
//!
//! # Architecture
//!
//! ```text
//! QueryRequest
//!     ↓
//! QueryCompiler
//!     ├─→ text relevance (3 boosted multi_match clauses)
//!     ├─→ filters: type/status/ids/mime/parent/author
//!     │     ├─→ taxonomy builder  → terms.<tax>.<field>
//!     │     ├─→ meta builder      → meta.<key>.<typed suffix>
//!     │     └─→ date translator   → date_terms.<unit> / ranges
//!     ├─→ sort / random envelope
//!     └─→ aggs
//!     ↓
//! CompiledQuery (clause AST) → wire JSON
//! ```
//!
//! Filters restricting membership always go under `post_filter` so they
//! never influence relevance.
//!
//! # Example
//!
//! ```rust
//! use search_sync::IndexerConfig;
//! use search_sync::query::{CallerContext, QueryCompiler, QueryRequest};
//!
//! let compiler = QueryCompiler::new(IndexerConfig::default());
//! let request = QueryRequest::new().search("rust async");
//! let compiled = compiler.compile(&request, &CallerContext::default());
//!
//! let body = compiled.to_value();
//! assert_eq!(body["query"]["bool"]["should"].as_array().unwrap().len(), 3);
//! ```

mod clause;
mod compiler;
mod date;
mod meta;
mod request;
mod response;
mod taxonomy;
pub mod wire;

use thiserror::Error;

pub use clause::{BoolQuery, Clause, MultiMatchClause, Occur, RangeClause};
pub use compiler::{CallerContext, CompiledQuery, QueryCompiler, SortField, DEFAULT_AGGREGATION_NAME};
pub use date::{parse_relative, DateTranslator, DATE_COLUMNS};
pub use meta::{build_meta_clause, build_meta_clauses, build_meta_filter, meta_field_path};
pub use request::{
    AggregationSpec, DateBound, DateClause, DateQuery, DateQueryItem, DateUnit, MetaClause, MetaCompare,
    MetaQuery, MetaQueryItem, MetaType, MimeFilter, OrderBy, PageSize, ParentFilter, QueryRequest, Relation,
    SortOrder, TaxClause, TaxField, TaxOperator, TaxQuery, ValueFilter,
};
pub use response::{SearchHit, SearchResults};
pub use taxonomy::{build_tax_filter, slug_shorthand};
pub use wire::WireError;

/// A nested meta/date group exceeded the configured depth.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("query nesting too deep (depth {depth})")]
pub struct RecursionTooDeep {
    pub depth: usize,
}
