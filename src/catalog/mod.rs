//! Item catalog: label files loaded from disk plus their frequency table.
//!
//! The catalog is built once per run and is read-only afterwards. Item order
//! is the sorted order of the label-file paths and is the order every later
//! stage (decision variables, selection list) refers to.
//!
//! # Usage
//!
//! ```rust,ignore
//! use coverforge::catalog::{Catalog, CatalogOptions};
//!
//! let catalog = Catalog::load("./dataset", &CatalogOptions::default())?;
//! println!("{} items, {} labels", catalog.len(), catalog.labels().len());
//! ```

pub mod labels;
pub mod source;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CatalogError;

pub use labels::{default_denylist, LabelCount, LabelTable, DEFAULT_DENYLIST};
pub use source::{glob_to_regex, parse_labels, resolve_sources};

/// Default extension of per-item label files.
pub const DEFAULT_EXTENSION: &str = "txt";

/// A single catalog entry: a label file and the labels it lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Path of the label file.
    pub path: PathBuf,
    /// File name, used as the item's display identity.
    pub name: String,
    /// Labels as read, in file order. May contain repeats.
    pub labels: Vec<String>,
}

impl Item {
    pub fn new(path: impl Into<PathBuf>, labels: Vec<String>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name, labels }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Options controlling how label sources are discovered and counted.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Extension of label files when the source is a directory.
    pub extension: String,
    /// Labels excluded from frequency counting.
    pub denylist: HashSet<String>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            denylist: default_denylist(),
        }
    }
}

impl CatalogOptions {
    /// Sets the label-file extension (leading dot is ignored).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Replaces the denylist.
    pub fn with_denylist(mut self, denylist: HashSet<String>) -> Self {
        self.denylist = denylist;
        self
    }

    /// Adds labels to the denylist.
    pub fn deny<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denylist.extend(labels.into_iter().map(Into::into));
        self
    }
}

/// The loaded item pool and its label frequencies.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<Item>,
    labels: LabelTable,
}

impl Catalog {
    /// Builds a catalog from already-loaded items.
    pub fn from_items(items: Vec<Item>, denylist: &HashSet<String>) -> Self {
        let labels = LabelTable::tally(&items, denylist);
        Self { items, labels }
    }

    /// Loads every label file named by `source` (directory or glob).
    ///
    /// Any unreadable file aborts the whole load.
    pub fn load(source: &str, options: &CatalogOptions) -> Result<Self, CatalogError> {
        let paths = resolve_sources(source, &options.extension)?;
        info!(files = paths.len(), source = %source, "Loading label files");

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            items.push(read_item(&path)?);
        }

        let catalog = Self::from_items(items, &options.denylist);
        info!(
            items = catalog.len(),
            labels = catalog.labels.len(),
            denylisted = options.denylist.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn read_item(path: &Path) -> Result<Item, CatalogError> {
    let content = fs::read_to_string(path).map_err(|source| CatalogError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let labels = parse_labels(&content);
    debug!(path = %path.display(), labels = labels.len(), "Read label file");
    Ok(Item::new(path, labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_name_from_path() {
        let item = Item::new("/data/set/0001.txt", vec!["cat".to_string()]);
        assert_eq!(item.name, "0001.txt");
        assert!(item.has_label("cat"));
        assert!(!item.has_label("Cat"));
    }

    #[test]
    fn test_options_extension_strips_dot() {
        let options = CatalogOptions::default().with_extension(".tags");
        assert_eq!(options.extension, "tags");
    }

    #[test]
    fn test_options_deny_extends_defaults() {
        let options = CatalogOptions::default().deny(["watermark"]);
        assert!(options.denylist.contains("watermark"));
        assert!(options.denylist.contains("highres"));
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "dog, highres").unwrap();
        fs::write(dir.path().join("a.txt"), "cat, dog").unwrap();

        let catalog =
            Catalog::load(dir.path().to_str().unwrap(), &CatalogOptions::default()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.items()[0].name, "a.txt");
        assert_eq!(catalog.labels().count("dog"), 2);
        assert_eq!(catalog.labels().count("highres"), 0);
        // denylisted labels stay in the raw label list
        assert!(catalog.items()[1].has_label("highres"));
    }

    #[test]
    fn test_load_unreadable_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.txt"), "cat").unwrap();
        // invalid UTF-8 cannot be read as a string
        fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00]).unwrap();

        let err = Catalog::load(dir.path().to_str().unwrap(), &CatalogOptions::default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::Unreadable { .. }));
    }
}
