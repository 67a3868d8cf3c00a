// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Extension points.
//!
//! Hosts customize indexing and querying by registering strategies for a
//! fixed set of [`ExtensionPoint`]s. Strategies run in registration order.
//!
//! ```rust
//! use search_sync::hooks::{ExtensionPoint, Hook, HookRegistry};
//!
//! let mut hooks = HookRegistry::new();
//! hooks.register(Hook::skip_index(|doc| doc.post_type == "revision"));
//! hooks.register(Hook::prepare_document(|doc| doc.post_title = doc.post_title.trim().to_string()));
//!
//! assert_eq!(hooks.registered(ExtensionPoint::SkipIndex), 1);
//! assert_eq!(hooks.registered(ExtensionPoint::AdjustCompiledQuery), 0);
//! ```

use std::fmt;

use crate::document::Document;
use crate::query::CompiledQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionPoint {
    /// Veto indexing of a prepared document
    SkipIndex,
    /// Mutate a prepared document before encoding
    PrepareDocument,
    /// Mutate a compiled query after all built-in rules ran
    AdjustCompiledQuery,
}

type SkipFn = Box<dyn Fn(&Document) -> bool + Send + Sync>;
type PrepareFn = Box<dyn Fn(&mut Document) + Send + Sync>;
type AdjustFn = Box<dyn Fn(&mut CompiledQuery) + Send + Sync>;

/// A strategy bound to its extension point.
pub enum Hook {
    SkipIndex(SkipFn),
    PrepareDocument(PrepareFn),
    AdjustCompiledQuery(AdjustFn),
}

impl Hook {
    pub fn skip_index(f: impl Fn(&Document) -> bool + Send + Sync + 'static) -> Self {
        Hook::SkipIndex(Box::new(f))
    }

    pub fn prepare_document(f: impl Fn(&mut Document) + Send + Sync + 'static) -> Self {
        Hook::PrepareDocument(Box::new(f))
    }

    pub fn adjust_compiled_query(f: impl Fn(&mut CompiledQuery) + Send + Sync + 'static) -> Self {
        Hook::AdjustCompiledQuery(Box::new(f))
    }

    #[must_use]
    pub fn point(&self) -> ExtensionPoint {
        match self {
            Hook::SkipIndex(_) => ExtensionPoint::SkipIndex,
            Hook::PrepareDocument(_) => ExtensionPoint::PrepareDocument,
            Hook::AdjustCompiledQuery(_) => ExtensionPoint::AdjustCompiledQuery,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook({:?})", self.point())
    }
}

/// Registration table of strategies.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Hook) -> &mut Self {
        self.hooks.push(hook);
        self
    }

    /// Number of strategies registered for `point`.
    #[must_use]
    pub fn registered(&self, point: ExtensionPoint) -> usize {
        self.hooks.iter().filter(|h| h.point() == point).count()
    }

    /// True when any skip strategy vetoes the document.
    pub fn skip_index(&self, doc: &Document) -> bool {
        self.hooks.iter().any(|h| match h {
            Hook::SkipIndex(f) => f(doc),
            _ => false,
        })
    }

    pub fn prepare(&self, doc: &mut Document) {
        for hook in &self.hooks {
            if let Hook::PrepareDocument(f) = hook {
                f(doc);
            }
        }
    }

    pub fn adjust_query(&self, query: &mut CompiledQuery) {
        for hook in &self.hooks {
            if let Hook::AdjustCompiledQuery(f) = hook {
                f(query);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CallerContext, QueryCompiler, QueryRequest};
    use crate::IndexerConfig;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn doc(id: u64, post_type: &str) -> Document {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        Document::new(id, post_type, date)
    }

    #[test]
    fn test_skip_index_any_veto() {
        let mut hooks = HookRegistry::new();
        hooks
            .register(Hook::skip_index(|d| d.id == 2))
            .register(Hook::skip_index(|d| d.post_type == "attachment"));
        assert!(!hooks.skip_index(&doc(1, "post")));
        assert!(hooks.skip_index(&doc(2, "post")));
        assert!(hooks.skip_index(&doc(3, "attachment")));
    }

    #[test]
    fn test_prepare_runs_in_order() {
        let mut hooks = HookRegistry::new();
        hooks
            .register(Hook::prepare_document(|d| d.post_title.push('a')))
            .register(Hook::prepare_document(|d| d.post_title.push('b')));
        let mut d = doc(1, "post");
        hooks.prepare(&mut d);
        assert_eq!(d.post_title, "ab");
    }

    #[test]
    fn test_adjust_query_runs_last_in_compile() {
        let mut hooks = HookRegistry::new();
        hooks.register(Hook::adjust_compiled_query(|q| q.size = 3));
        let compiler = QueryCompiler::new(IndexerConfig::default()).with_hooks(Arc::new(hooks));
        let compiled = compiler.compile(&QueryRequest::new(), &CallerContext::default());
        assert_eq!(compiled.size, 3);
    }
}
