//! Discovery of model roots and model types from configured category paths.
//!
//! Every configured path `P` that has a final component contributes one
//! root (`P`'s parent, also used as its label) and one model type (`P`'s
//! final component). Discovery runs once per catalog and is then cached.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::Serialize;

use super::DirectError;
use crate::resolve::expand_home;

/// One discovered root and the model types found under it (sorted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoot {
    pub path: PathBuf,
    pub model_types: Vec<String>,
}

/// Choice lists offered to a caller selecting `models_path` / `model_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeChoices {
    pub models_paths: Vec<String>,
    pub model_types: Vec<String>,
    pub default_models_path: String,
    pub default_model_type: String,
}

#[derive(Debug)]
pub struct DirectoryCatalog {
    categories: BTreeMap<String, Vec<PathBuf>>,
    discovered: OnceLock<BTreeMap<String, ModelRoot>>,
}

impl DirectoryCatalog {
    pub fn new(categories: BTreeMap<String, Vec<PathBuf>>) -> Self {
        Self {
            categories,
            discovered: OnceLock::new(),
        }
    }

    /// Label -> root, discovered on first use. A failed discovery is not
    /// cached, so fixing the configuration and retrying works.
    pub fn roots(&self) -> Result<&BTreeMap<String, ModelRoot>, DirectError> {
        if let Some(found) = self.discovered.get() {
            return Ok(found);
        }
        let found = discover(&self.categories)?;
        Ok(self.discovered.get_or_init(|| found))
    }

    pub fn root(&self, label: &str) -> Result<Option<&ModelRoot>, DirectError> {
        Ok(self.roots()?.get(label))
    }

    pub fn choices(&self) -> Result<NodeChoices, DirectError> {
        let roots = self.roots()?;
        let models_paths: Vec<String> = roots.keys().cloned().collect();
        let default_models_path = models_paths.first().cloned().unwrap_or_default();

        let model_types: Vec<String> = roots
            .values()
            .flat_map(|r| r.model_types.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let default_model_type = roots
            .get(&default_models_path)
            .and_then(|r| r.model_types.first())
            .or_else(|| model_types.first())
            .cloned()
            .unwrap_or_default();

        Ok(NodeChoices {
            models_paths,
            model_types,
            default_models_path,
            default_model_type,
        })
    }
}

fn discover(
    categories: &BTreeMap<String, Vec<PathBuf>>,
) -> Result<BTreeMap<String, ModelRoot>, DirectError> {
    let mut types: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();
    for path in categories.values().flatten() {
        let path = expand_home(path);
        let (Some(name), Some(parent)) = (path.file_name(), path.parent()) else {
            continue;
        };
        types
            .entry(parent.to_path_buf())
            .or_default()
            .insert(name.to_string_lossy().into_owned());
    }
    if types.is_empty() {
        return Err(DirectError::NoModelPaths);
    }
    tracing::debug!(roots = types.len(), "discovered model roots");

    Ok(types
        .into_iter()
        .map(|(path, names)| {
            let label = path.display().to_string();
            let root = ModelRoot {
                path,
                model_types: names.into_iter().collect(),
            };
            (label, root)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(&str, &[&str])]) -> DirectoryCatalog {
        DirectoryCatalog::new(
            entries
                .iter()
                .map(|(k, paths)| (k.to_string(), paths.iter().map(PathBuf::from).collect()))
                .collect(),
        )
    }

    #[test]
    fn groups_types_under_parent() {
        let c = catalog(&[
            ("checkpoints", &["/models/checkpoints", "/extra/checkpoints"]),
            ("loras", &["/models/loras"]),
            ("vae", &["/models/vae"]),
        ]);
        let roots = c.roots().unwrap();
        assert_eq!(
            roots.keys().collect::<Vec<_>>(),
            ["/extra", "/models"]
        );
        assert_eq!(
            roots["/models"].model_types,
            ["checkpoints", "loras", "vae"]
        );
        assert_eq!(roots["/extra"].path, PathBuf::from("/extra"));
    }

    #[test]
    fn choices_sorted_with_defaults() {
        let c = catalog(&[
            ("vae", &["/models/vae"]),
            ("checkpoints", &["/extra/checkpoints", "/models/checkpoints"]),
        ]);
        let choices = c.choices().unwrap();
        assert_eq!(choices.models_paths, ["/extra", "/models"]);
        assert_eq!(choices.model_types, ["checkpoints", "vae"]);
        assert_eq!(choices.default_models_path, "/extra");
        assert_eq!(choices.default_model_type, "checkpoints");
    }

    #[test]
    fn no_paths_is_an_error() {
        let c = catalog(&[("checkpoints", &[]), ("root", &["/"])]);
        assert!(matches!(c.roots(), Err(DirectError::NoModelPaths)));
    }
}
