//! Netlist source selection.
//!
//! The datasheet can name several circuit representations; `best` picks
//! the most accurate one that actually exists on disk.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::Paths;

/// Netlist source requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NetlistSource {
    Schematic,
    Layout,
    Pex,
    Rcx,
    /// Prefer the full parasitic extraction, fall back to layout, then
    /// schematic.
    Best,
}

impl std::fmt::Display for NetlistSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NetlistSource::Schematic => "schematic",
            NetlistSource::Layout => "layout",
            NetlistSource::Pex => "pex",
            NetlistSource::Rcx => "rcx",
            NetlistSource::Best => "best",
        };
        f.write_str(s)
    }
}

/// A concrete netlist source, after `best` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcreteSource {
    Schematic,
    Layout,
    Pex,
    Rcx,
}

impl std::fmt::Display for ConcreteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConcreteSource::Schematic => "schematic",
            ConcreteSource::Layout => "layout",
            ConcreteSource::Pex => "pex",
            ConcreteSource::Rcx => "rcx",
        };
        f.write_str(s)
    }
}

/// Which netlist representations exist for a design.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvailableSources {
    pub schematic: bool,
    pub layout: bool,
    pub pex: bool,
    pub rcx: bool,
}

impl AvailableSources {
    /// Probe the filesystem for the netlists the datasheet names.
    pub fn probe(root: &Path, paths: &Paths) -> Self {
        let exists = |p: &Option<std::path::PathBuf>| {
            p.as_deref().is_some_and(|p| root.join(p).exists())
        };
        Self {
            schematic: exists(&paths.schematic),
            layout: exists(&paths.layout),
            pex: exists(&paths.pex),
            rcx: exists(&paths.rcx),
        }
    }
}

/// Resolve `best` against the available representations: full R-C
/// extraction first, then capacitance-only extraction, then layout, then
/// schematic. Returns `None` when nothing is available.
pub fn resolve_best(available: AvailableSources) -> Option<ConcreteSource> {
    if available.rcx {
        Some(ConcreteSource::Rcx)
    } else if available.pex {
        Some(ConcreteSource::Pex)
    } else if available.layout {
        Some(ConcreteSource::Layout)
    } else if available.schematic {
        Some(ConcreteSource::Schematic)
    } else {
        None
    }
}

/// Resolve a requested source. A concrete request is taken as-is; only
/// `best` consults availability.
pub fn resolve_source(
    requested: NetlistSource,
    available: AvailableSources,
) -> Option<ConcreteSource> {
    match requested {
        NetlistSource::Schematic => Some(ConcreteSource::Schematic),
        NetlistSource::Layout => Some(ConcreteSource::Layout),
        NetlistSource::Pex => Some(ConcreteSource::Pex),
        NetlistSource::Rcx => Some(ConcreteSource::Rcx),
        NetlistSource::Best => resolve_best(available),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_prefers_full_extraction() {
        let avail = AvailableSources {
            schematic: true,
            layout: true,
            pex: true,
            rcx: true,
        };
        assert_eq!(resolve_best(avail), Some(ConcreteSource::Rcx));

        let avail = AvailableSources {
            schematic: true,
            layout: true,
            pex: true,
            rcx: false,
        };
        assert_eq!(resolve_best(avail), Some(ConcreteSource::Pex));
    }

    #[test]
    fn best_falls_back_to_schematic() {
        let avail = AvailableSources {
            schematic: true,
            ..Default::default()
        };
        assert_eq!(resolve_best(avail), Some(ConcreteSource::Schematic));
        assert_eq!(resolve_best(AvailableSources::default()), None);
    }

    #[test]
    fn concrete_request_is_identity() {
        let none = AvailableSources::default();
        assert_eq!(
            resolve_source(NetlistSource::Layout, none),
            Some(ConcreteSource::Layout)
        );
    }
}
