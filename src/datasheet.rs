//! Datasheet loading, lookup, and annotated save.
//!
//! A datasheet is the YAML specification document describing all
//! parameters, their limits, and the netlist paths for one design. The
//! orchestration core only reads from it and writes result records back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Error;
use crate::model::{ParameterDef, Paths, ResultRecord};

/// In-memory datasheet document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datasheet {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub paths: Paths,
    /// Document order is preserved and defines queueing order when all
    /// parameters are run.
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    /// Directory the datasheet was loaded from; netlist paths are
    /// resolved relative to it.
    #[serde(skip)]
    pub root: PathBuf,
}

impl Datasheet {
    /// Parse a datasheet from YAML text. `root` anchors relative paths.
    pub fn from_yaml(text: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut ds: Datasheet = serde_yaml::from_str(text).context("parsing datasheet")?;
        ds.root = root.into();
        ds.validate()?;
        Ok(ds)
    }

    /// Load a datasheet file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading datasheet {}", path.display()))?;
        let root = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let ds = Self::from_yaml(&text, root)
            .with_context(|| format!("loading datasheet {}", path.display()))?;
        info!(
            "loaded datasheet '{}' with {} parameters",
            ds.name,
            ds.parameters.len()
        );
        Ok(ds)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                bail!("duplicate parameter name: {}", param.name);
            }
        }
        Ok(())
    }

    /// All parameter names in document order.
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Look up one parameter definition.
    pub fn get(&self, name: &str) -> Result<&ParameterDef, Error> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Directory where run directories are created for this design.
    pub fn run_path(&self) -> PathBuf {
        match &self.paths.runs {
            Some(p) => self.root.join(p),
            None => self.root.join("runs"),
        }
    }

    /// Write the datasheet back with result records attached to each
    /// parameter that has one.
    pub fn save_annotated(
        &self,
        records: &BTreeMap<String, ResultRecord>,
        path: &Path,
    ) -> Result<()> {
        let mut out = self.clone();
        for param in &mut out.parameters {
            param.results = records.get(&param.name).cloned();
        }
        let text = serde_yaml::to_string(&out).context("serializing datasheet")?;
        std::fs::write(path, text)
            .with_context(|| format!("writing datasheet {}", path.display()))?;
        info!("saved annotated datasheet to {}", path.display());
        Ok(())
    }
}

/// Search a directory for a datasheet file, taking the lexically first
/// `*.yaml`/`*.yml` entry.
pub fn find_datasheet(dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("scanning {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect();
    candidates.sort();
    match candidates.into_iter().next() {
        Some(p) => {
            info!("found datasheet {}", p.display());
            Ok(p)
        }
        None => bail!("no datasheet found in {}", dir.display()),
    }
}
