use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chesszero_search::{SearchConfig, SmoothingConfig};
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetLayout;
use crate::error::Result;

/// How positions are turned into dataset rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub layout: DatasetLayout,

    /// Scale move counters into [0, 1) before encoding
    pub normalize_planes: bool,

    /// Smoothing applied by `record_node` and `export_positions`
    pub smoothing: SmoothingConfig,
}

impl ExportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: DatasetLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_normalize_planes(mut self, normalize: bool) -> Self {
        self.normalize_planes = normalize;
        self
    }

    pub fn with_smoothing(mut self, smoothing: SmoothingConfig) -> Self {
        self.smoothing = smoothing;
        self
    }
}

/// Self-play game settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfPlayConfig {
    pub search: SearchConfig,

    /// Adjudicate a draw after this many plies
    pub max_plies: usize,

    /// Starting position, standard start if unset
    pub start_fen: Option<String>,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            max_plies: 512,
            start_fen: None,
        }
    }
}

impl SelfPlayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_max_plies(mut self, plies: usize) -> Self {
        self.max_plies = plies;
        self
    }

    pub fn with_start_fen(mut self, fen: impl Into<String>) -> Self {
        self.start_fen = Some(fen.into());
        self
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub export: ExportConfig,
    pub selfplay: SelfPlayConfig,
}

impl Config {
    /// Load a config file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.export.layout.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.export.layout.chunk_rows, 128);
        assert!(!config.export.normalize_planes);
        assert_eq!(config.selfplay.max_plies, 512);
        assert!(config.selfplay.start_fen.is_none());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"export": {{"layout": {{"chunk_rows": 16}}, "smoothing": {{"uniform_mix": 0.1}}}},
                "selfplay": {{"max_plies": 40}}}}"#
        )
        .unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.export.layout.chunk_rows, 16);
        assert_eq!(config.export.layout.labels, 1858);
        assert_eq!(config.export.smoothing.uniform_mix, 0.1);
        assert_eq!(config.export.smoothing.temperature, 1.0);
        assert_eq!(config.selfplay.max_plies, 40);
        assert_eq!(config.selfplay.search.num_simulations, 200);
    }

    #[test]
    fn test_zero_chunk_rows_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"export": {{"layout": {{"chunk_rows": 0}}}}}}"#).unwrap();

        assert!(matches!(
            Config::from_json_file(file.path()),
            Err(crate::ExportError::InvalidLayout(_))
        ));
    }
}
