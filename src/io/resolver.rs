//! Lookup of products derived from the same flight (DEM, DTM, hillshade)

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Sibling raster generated for the same capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiblingProduct {
    Dem,
    Dtm,
    Hillshade,
}

impl SiblingProduct {
    /// Directory and filename suffix used by the photogrammetry export
    pub fn product_name(self) -> &'static str {
        match self {
            SiblingProduct::Dem => "DEM",
            SiblingProduct::Dtm => "DTM",
            SiblingProduct::Hillshade => "Hillshade",
        }
    }
}

impl std::fmt::Display for SiblingProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.product_name())
    }
}

/// Identity of a capture as seen by a resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureKey<'a> {
    /// Base filename without extension
    pub name: &'a str,
    pub capture_id: &'a str,
}

/// Finds sibling products of a capture.
///
/// Returning `None` means the product does not exist; that is not an error.
pub trait ArtifactResolver: Send + Sync {
    fn resolve(&self, product: SiblingProduct, capture: &CaptureKey<'_>) -> Option<PathBuf>;
}

/// Resolves `{root}/{Product}/{name}_{Product}.tif` and keeps it only if
/// the file exists.
#[derive(Debug, Clone)]
pub struct ConventionResolver {
    root: PathBuf,
}

impl ConventionResolver {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Resolver rooted at the directory holding `source`
    pub fn beside<P: AsRef<Path>>(source: P) -> Self {
        let root = match source.as_ref().parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Conventional path of a product, whether or not it exists
    pub fn sibling_path(&self, product: SiblingProduct, name: &str) -> PathBuf {
        let root = std::fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        root.join(product.product_name())
            .join(format!("{}_{}.tif", name, product.product_name()))
    }
}

impl ArtifactResolver for ConventionResolver {
    fn resolve(&self, product: SiblingProduct, capture: &CaptureKey<'_>) -> Option<PathBuf> {
        let path = self.sibling_path(product, capture.name);
        if path.is_file() {
            Some(path)
        } else {
            log::debug!("No {} found at {}", product, path.display());
            None
        }
    }
}

/// Fixed product paths, without touching the filesystem
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    paths: HashMap<SiblingProduct, PathBuf>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, product: SiblingProduct, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(product, path.into());
        self
    }
}

impl ArtifactResolver for StaticResolver {
    fn resolve(&self, product: SiblingProduct, _capture: &CaptureKey<'_>) -> Option<PathBuf> {
        self.paths.get(&product).cloned()
    }
}
