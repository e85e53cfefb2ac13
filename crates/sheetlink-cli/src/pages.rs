//! Directory-backed page resolver

use std::io;
use std::path::{Path, PathBuf};

use sheetlink::{
    read_sheet_file, PageRef, PageResolver, ResolveError, ResolvedSheet, SerializeError,
};

/// Extension of page files inside a pages directory
pub const PAGE_EXTENSION: &str = "sheet";

/// Resolves a page identifier `id` to the raw-form file `<dir>/<id>.sheet`.
///
/// Files carry no title, so a resolved page is titled with the reference's label.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file that holds `page_id`, if the identifier is usable as a file name
    pub fn page_path(&self, page_id: &str) -> Option<PathBuf> {
        let valid = !page_id.is_empty()
            && page_id != "."
            && page_id != ".."
            && !page_id.contains(['/', '\\', '\0']);
        valid.then(|| self.root.join(format!("{}.{}", page_id, PAGE_EXTENSION)))
    }
}

impl PageResolver for DirectoryResolver {
    fn resolve(&self, page: &PageRef) -> Result<ResolvedSheet, ResolveError> {
        let path = self
            .page_path(&page.identifier)
            .ok_or_else(|| ResolveError::new(page, "Invalid page identifier"))?;

        match read_sheet_file(&path) {
            Ok(sheet) => Ok(ResolvedSheet::new(
                page.identifier.as_str(),
                page.label.as_str(),
                sheet,
            )),
            Err(SerializeError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                Err(ResolveError::not_found(page))
            }
            Err(e) => Err(ResolveError::new(page, format!("Unreadable page: {}", e))),
        }
    }
}
