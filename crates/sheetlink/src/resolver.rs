//! In-memory page resolver

use std::collections::HashMap;
use std::sync::Arc;

use sheetlink_core::Sheet;
use sheetlink_formula::{PageRef, PageResolver, ResolveError, ResolvedSheet};

/// A page stored by [`MapResolver`]
#[derive(Debug, Clone)]
enum Entry {
    Page { title: String, sheet: Arc<Sheet> },
    /// A page that exists but must not be read
    Denied { title: String, message: String },
}

/// Resolves pages from an in-memory map keyed by page identifier.
///
/// Useful for tests and for hosts that already hold every page they allow a
/// sheet to read.
///
/// ```rust
/// use sheetlink::{MapResolver, PageRef, PageResolver, Sheet};
///
/// let mut pricing = Sheet::new();
/// pricing.set("B2", "200").unwrap();
///
/// let mut resolver = MapResolver::new();
/// resolver.insert("pricing-id", "Pricing", pricing);
///
/// let page = resolver.resolve(&PageRef::new("pricing-id", "Prices")).unwrap();
/// assert_eq!(page.page_title, "Pricing");
///
/// let err = resolver.resolve(&PageRef::new("missing", "Old prices")).unwrap_err();
/// assert_eq!(err.page_title.as_deref(), Some("Old prices"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    pages: HashMap<String, Entry>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a page
    pub fn insert<I: Into<String>, T: Into<String>>(&mut self, page_id: I, title: T, sheet: Sheet) {
        self.pages.insert(
            page_id.into(),
            Entry::Page {
                title: title.into(),
                sheet: Arc::new(sheet),
            },
        );
    }

    /// Builder form of [`MapResolver::insert`]
    pub fn with_page<I: Into<String>, T: Into<String>>(
        mut self,
        page_id: I,
        title: T,
        sheet: Sheet,
    ) -> Self {
        self.insert(page_id, title, sheet);
        self
    }

    /// Register a page that resolves to an error with `message`
    pub fn deny<I: Into<String>, T: Into<String>, M: Into<String>>(
        &mut self,
        page_id: I,
        title: T,
        message: M,
    ) {
        self.pages.insert(
            page_id.into(),
            Entry::Denied {
                title: title.into(),
                message: message.into(),
            },
        );
    }

    /// Remove a page; later resolutions report it as not found
    pub fn remove(&mut self, page_id: &str) -> bool {
        self.pages.remove(page_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl PageResolver for MapResolver {
    fn resolve(&self, page: &PageRef) -> Result<ResolvedSheet, ResolveError> {
        match self.pages.get(&page.identifier) {
            Some(Entry::Page { title, sheet }) => Ok(ResolvedSheet {
                page_id: page.identifier.clone(),
                page_title: title.clone(),
                sheet: Arc::clone(sheet),
            }),
            Some(Entry::Denied { title, message }) => {
                Err(ResolveError::new(page, message.clone()).with_title(title.clone()))
            }
            None => Err(ResolveError::not_found(page)),
        }
    }
}
