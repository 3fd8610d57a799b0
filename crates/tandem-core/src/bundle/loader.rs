use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use tandem_config::{resolve_path, BundlesConfig};
use tracing::{debug, info, warn};

use super::descriptor::{parse_descriptor, validate_bundle};
use super::types::{Bundle, BundleType};
use crate::error::{BundleError, ValidationError};

/// Builtin bundles embedded at compile time from the repo's `bundles/` directory.
static BUILTIN_BUNDLES: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/../../bundles");

/// Catalog of known bundle definitions, keyed by id.
///
/// Construct one per composition root; there is no process-wide instance.
#[derive(Debug, Default)]
pub struct BundleLoader {
    bundles: BTreeMap<String, Bundle>,
}

impl BundleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a loader populated according to configuration: builtins first,
    /// then the custom directory (custom bundles override builtins by id).
    pub fn from_config(config: &BundlesConfig) -> Self {
        let mut loader = Self::new();
        if config.load_builtins {
            loader.load_builtins();
        }
        if let Some(dir) = &config.custom_dir {
            loader.load_custom_bundles_from_dir(&resolve_path(dir));
        }
        loader
    }

    /// Register every embedded descriptor. Malformed builtins are skipped.
    pub fn load_builtins(&mut self) -> Vec<Bundle> {
        let mut loaded = Vec::new();
        for file in BUILTIN_BUNDLES.files() {
            if !has_bundle_extension(file.path()) {
                continue;
            }
            let name = file.path().display().to_string();
            let Some(contents) = file.contents_utf8() else {
                warn!("Builtin bundle {name} is not valid UTF-8");
                continue;
            };
            let bundle = match serde_json::from_str(contents)
                .map_err(|e| ValidationError::new("descriptor", e.to_string()))
                .and_then(parse_descriptor)
            {
                Ok(b) => b,
                Err(e) => {
                    warn!("Skipping builtin bundle {name}: {e}");
                    continue;
                }
            };
            self.insert(bundle.clone());
            loaded.push(bundle);
        }
        info!("Loaded {} builtin bundles", loaded.len());
        loaded
    }

    pub fn get_bundle(&self, id: &str) -> Option<&Bundle> {
        self.bundles.get(id)
    }

    /// All bundles, ordered by id.
    pub fn get_all(&self) -> Vec<&Bundle> {
        self.bundles.values().collect()
    }

    pub fn get_by_type(&self, bundle_type: BundleType) -> Vec<&Bundle> {
        self.filter(|b| b.bundle_type == bundle_type)
    }

    /// Case-insensitive substring match against each bundle's tags.
    pub fn search_by_tag(&self, tag: &str) -> Vec<&Bundle> {
        let needle = tag.to_lowercase();
        self.filter(|b| b.tags.iter().any(|t| t.to_lowercase().contains(&needle)))
    }

    /// Case-insensitive substring match against name or description.
    pub fn search(&self, query: &str) -> Vec<&Bundle> {
        let needle = query.to_lowercase();
        self.filter(|b| {
            b.name.to_lowercase().contains(&needle)
                || b.description.to_lowercase().contains(&needle)
        })
    }

    pub fn get_by_author(&self, author: &str) -> Vec<&Bundle> {
        self.filter(|b| b.author.as_deref() == Some(author))
    }

    /// Read, validate and register a single descriptor file.
    pub fn load_custom_bundle(&mut self, path: &Path) -> Result<Bundle, BundleError> {
        let contents = std::fs::read_to_string(path).map_err(|source| BundleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&contents).map_err(|source| BundleError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let bundle = parse_descriptor(value)?;
        debug!("Loaded bundle '{}' from {}", bundle.id, path.display());
        self.insert(bundle.clone());
        Ok(bundle)
    }

    /// Load every `*.json` descriptor in `dir`. Files that fail to load are
    /// logged and skipped; an unreadable directory yields an empty list.
    pub fn load_custom_bundles_from_dir(&mut self, dir: &Path) -> Vec<Bundle> {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("Failed to read bundle directory {}: {e}", dir.display());
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && has_bundle_extension(p))
            .collect();
        paths.sort();

        let mut loaded = Vec::new();
        for path in &paths {
            match self.load_custom_bundle(path) {
                Ok(bundle) => loaded.push(bundle),
                Err(e) => warn!("Skipping bundle {}: {e}", path.display()),
            }
        }

        info!(
            "Loaded {} of {} bundles from {}",
            loaded.len(),
            paths.len(),
            dir.display()
        );
        loaded
    }

    /// Register a bundle built in code. Overwrites any bundle with the same id.
    pub fn register_bundle(&mut self, bundle: Bundle) -> Result<(), ValidationError> {
        validate_bundle(&bundle)?;
        self.insert(bundle);
        Ok(())
    }

    /// Remove a bundle. Returns true if it existed.
    pub fn unregister_bundle(&mut self, id: &str) -> bool {
        self.bundles.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    fn insert(&mut self, bundle: Bundle) {
        if self.bundles.contains_key(&bundle.id) {
            debug!("Overwriting bundle '{}'", bundle.id);
        }
        self.bundles.insert(bundle.id.clone(), bundle);
    }

    fn filter(&self, pred: impl Fn(&Bundle) -> bool) -> Vec<&Bundle> {
        self.bundles.values().filter(|&b| pred(b)).collect()
    }
}

fn has_bundle_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
