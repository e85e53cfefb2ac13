//! External page resolution
//!
//! The evaluator never knows where other pages live. It hands the
//! [`PageRef`] of a cross-page reference to a [`PageResolver`], at most once
//! per identifier per evaluation pass.

use std::sync::Arc;

use sheetlink_core::Sheet;
use thiserror::Error;

use crate::ast::PageRef;

/// A page fetched by a resolver
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSheet {
    /// Identifier of the page, as it appears in references
    pub page_id: String,
    /// Human-readable page title
    pub page_title: String,
    /// The page's sheet, raw inputs only
    pub sheet: Arc<Sheet>,
}

impl ResolvedSheet {
    pub fn new<I: Into<String>, T: Into<String>>(page_id: I, page_title: T, sheet: Sheet) -> Self {
        Self {
            page_id: page_id.into(),
            page_title: page_title.into(),
            sheet: Arc::new(sheet),
        }
    }
}

/// Why a page could not be resolved.
///
/// The message is surfaced verbatim on every cell that reads the page.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{page_id}: {message}")]
pub struct ResolveError {
    pub page_id: String,
    pub page_title: Option<String>,
    pub message: String,
}

impl ResolveError {
    /// An error for `page`, titled with the reference's label
    pub fn new<M: Into<String>>(page: &PageRef, message: M) -> Self {
        Self {
            page_id: page.identifier.clone(),
            page_title: Some(page.label.clone()),
            message: message.into(),
        }
    }

    /// The page does not exist
    pub fn not_found(page: &PageRef) -> Self {
        Self::new(page, "Page not found")
    }

    pub fn with_title<T: Into<String>>(mut self, title: T) -> Self {
        self.page_title = Some(title.into());
        self
    }
}

/// Fetches the sheets of other pages.
///
/// Implementations must be synchronous and must not re-enter the evaluator.
pub trait PageResolver {
    /// Fetch the page `page` refers to; lookup goes by `page.identifier`
    fn resolve(&self, page: &PageRef) -> Result<ResolvedSheet, ResolveError>;
}

impl<F> PageResolver for F
where
    F: Fn(&PageRef) -> Result<ResolvedSheet, ResolveError>,
{
    fn resolve(&self, page: &PageRef) -> Result<ResolvedSheet, ResolveError> {
        self(page)
    }
}

/// A resolver that knows no pages
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl PageResolver for NullResolver {
    fn resolve(&self, page: &PageRef) -> Result<ResolvedSheet, ResolveError> {
        Err(ResolveError::not_found(page))
    }
}
