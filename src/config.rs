//! Run configuration
//!
//! The configuration is a JSON document describing the region to plot, the
//! annotation file, the directory of alignment files and optional gene
//! symbols and render settings. Relative paths are resolved against the
//! directory holding the configuration file.

use crate::annotation::SymbolMap;
use crate::error::TrackError;
use crate::render::RenderSettings;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Region fields as written in the configuration. Every field is required;
/// absence is reported by [`crate::region::select_region`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionConfig {
    pub genome: Option<String>,
    pub chr: Option<String>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub strand: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnnotationsConfig {
    pub gtf: Option<PathBuf>,
}

/// Gene id to display symbol lists, matched by position
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenesConfig {
    #[serde(default)]
    pub solycids: Vec<String>,
    #[serde(default)]
    pub symbol: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub region: RegionConfig,
    #[serde(default)]
    pub annotations: AnnotationsConfig,
    pub bamdir: Option<PathBuf>,
    #[serde(default)]
    pub genes: GenesConfig,
    #[serde(default)]
    pub render: RenderSettings,
}

impl Config {
    /// Read and deserialize a configuration file
    pub fn from_path(path: &Path) -> Result<Self, TrackError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrackError::configuration(
                &path.display().to_string(),
                format!("failed to read configuration: {e}"),
            )
        })?;

        let mut config = Self::from_json(&contents)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self, TrackError> {
        serde_json::from_str(contents).map_err(|e| {
            TrackError::configuration("<document>", format!("invalid configuration: {e}"))
        })
    }

    /// Make relative annotation and alignment paths relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(gtf) = self.annotations.gtf.as_mut() {
            resolve(gtf);
        }
        if let Some(dir) = self.bamdir.as_mut() {
            resolve(dir);
        }
    }

    pub fn annotation_path(&self) -> Result<&Path, TrackError> {
        self.annotations
            .gtf
            .as_deref()
            .ok_or_else(|| TrackError::configuration("annotations.gtf", "missing field"))
    }

    pub fn bam_dir(&self) -> Result<&Path, TrackError> {
        self.bamdir
            .as_deref()
            .ok_or_else(|| TrackError::configuration("bamdir", "missing field"))
    }

    /// Build the gene id to symbol mapping from `genes.solycids` and `genes.symbol`
    pub fn symbol_map(&self) -> Result<SymbolMap, TrackError> {
        SymbolMap::from_lists(&self.genes.solycids, &self.genes.symbol)
    }
}
