//! The read-only catalog of page layouts and their stylesheets.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};

use super::convert::php_to_handlebars;
use crate::error::{CldError, Result};

const TEMPLATE_EXT: &str = "php";
const STYLE_EXT: &str = "css";

/// Layout resources compiled into the binary.
const BUNDLED: &[(&str, &str)] = &[
    (
        "one-horizontal-top-two-vertical-angled-bottom.php",
        include_str!("../../layouts/one-horizontal-top-two-vertical-angled-bottom.php"),
    ),
    (
        "one-horizontal-top-two-vertical-angled-bottom.css",
        include_str!("../../layouts/one-horizontal-top-two-vertical-angled-bottom.css"),
    ),
    (
        "two-horizontal-angled.php",
        include_str!("../../layouts/two-horizontal-angled.php"),
    ),
    (
        "two-horizontal-angled.css",
        include_str!("../../layouts/two-horizontal-angled.css"),
    ),
    (
        "two-vertical-angled-top-one-horizontal-bottom.php",
        include_str!("../../layouts/two-vertical-angled-top-one-horizontal-bottom.php"),
    ),
    (
        "two-vertical-angled-top-one-horizontal-bottom.css",
        include_str!("../../layouts/two-vertical-angled-top-one-horizontal-bottom.css"),
    ),
];

/// A named layout resource file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutResource {
    pub file_name: String,
    pub contents: String,
}

impl LayoutResource {
    pub fn new(file_name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }
}

/// Layout templates and styles keyed by file stem.
///
/// Built once at startup and never mutated, so it is shared by reference
/// without locking.
pub struct LayoutCatalog {
    layouts: BTreeMap<String, String>,
    templates: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    registry: Handlebars<'static>,
}

impl LayoutCatalog {
    /// A catalog with no layouts.
    pub fn empty() -> Self {
        Self {
            layouts: BTreeMap::new(),
            templates: BTreeMap::new(),
            styles: BTreeMap::new(),
            registry: Handlebars::new(),
        }
    }

    /// Builds the catalog from the layouts compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_resources(
            BUNDLED
                .iter()
                .map(|(name, contents)| LayoutResource::new(*name, *contents)),
        )
    }

    /// Builds the catalog from the files directly inside `dir`.
    ///
    /// Unreadable files are skipped with a warning.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            CldError::Startup(format!("failed to read layouts directory {}: {e}", dir.display()))
        })?;

        let mut resources = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            match std::fs::read_to_string(&path) {
                Ok(contents) => resources.push(LayoutResource::new(file_name, contents)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable layout file"),
            }
        }

        Self::from_resources(resources)
    }

    /// Builds the catalog from a listing of resources.
    ///
    /// `.php` resources become templates (converted to Handlebars and parsed
    /// eagerly), `.css` resources become styles. Other files are ignored.
    pub fn from_resources<I>(resources: I) -> Result<Self>
    where
        I: IntoIterator<Item = LayoutResource>,
    {
        let mut catalog = Self::empty();

        for resource in resources {
            let path = Path::new(&resource.file_name);
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|e| e.to_str()),
            ) else {
                trace!(file = %resource.file_name, "Ignoring resource without extension");
                continue;
            };

            match ext {
                TEMPLATE_EXT => {
                    let template = php_to_handlebars(&resource.contents);
                    catalog
                        .registry
                        .register_template_string(stem, &template)
                        .map_err(|e| CldError::TemplateParse {
                            name: stem.to_string(),
                            reason: e.to_string(),
                        })?;
                    debug!(layout = stem, "Loaded layout template");
                    catalog.layouts.insert(stem.to_string(), stem.to_string());
                    catalog.templates.insert(stem.to_string(), template);
                }
                STYLE_EXT => {
                    debug!(layout = stem, "Loaded layout style");
                    catalog.styles.insert(stem.to_string(), resource.contents);
                }
                _ => trace!(file = %resource.file_name, "Ignoring non-layout resource"),
            }
        }

        info!(
            templates = catalog.templates.len(),
            styles = catalog.styles.len(),
            "Layout catalog loaded"
        );
        Ok(catalog)
    }

    /// Layout names mapped to their display names.
    pub fn layouts(&self) -> &BTreeMap<String, String> {
        &self.layouts
    }

    /// Layout names mapped to converted template markup.
    pub fn templates(&self) -> &BTreeMap<String, String> {
        &self.templates
    }

    /// Layout names mapped to stylesheet text.
    pub fn styles(&self) -> &BTreeMap<String, String> {
        &self.styles
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Renders a layout template with the given data.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        if !self.contains(name) {
            return Err(CldError::LayoutNotFound {
                name: name.to_string(),
            });
        }
        self.registry
            .render(name, data)
            .map_err(|e| CldError::TemplateRender {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Debug for LayoutCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutCatalog")
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .field("styles", &self.styles.keys().collect::<Vec<_>>())
            .finish()
    }
}
