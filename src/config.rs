use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// The seven layers of the 2023 Atsugi city open-data drop. A config file
/// replaces the whole table.
const BUILTIN_DATASETS: [(&str, &str); 7] = [
    ("shelter", "避難施設情報"),
    ("landmark", "ランドマーク情報"),
    ("station", "鉄道駅情報"),
    ("emergency_route", "緊急輸送道路情報"),
    ("railway", "鉄道情報"),
    ("park", "公園情報"),
    ("border", "行政界情報"),
];

/// One input layer and where its per-town pieces go.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub key: String,
    /// Display name used in log output.
    pub label: String,
    pub input: PathBuf,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Town boundary layer. May contain several features per town; they are
    /// dissolved into one boundary each.
    pub towns: PathBuf,
    /// Property holding the town name, also the column stamped onto output
    /// features.
    #[serde(default = "default_town_column")]
    pub town_column: String,
    pub datasets: Vec<DatasetConfig>,
}

fn default_town_column() -> String {
    "TOWN".to_string()
}

impl Config {
    /// Reads a JSON config file. Relative paths inside it resolve against
    /// the file's own directory.
    pub fn from_file(path: &Path) -> Result<Config> {
        let raw = fs_err::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.rebase(path.parent().unwrap_or_else(|| Path::new(".")));
        Ok(config)
    }

    /// The built-in dataset table, rooted at `base_dir`.
    pub fn builtin(base_dir: &Path) -> Config {
        Config {
            towns: base_dir.join("townInfo.geojson"),
            town_column: default_town_column(),
            datasets: BUILTIN_DATASETS
                .iter()
                .map(|(key, label)| DatasetConfig {
                    key: (*key).to_string(),
                    label: (*label).to_string(),
                    input: base_dir.join(format!("14212_atsugi-shi_city_2023_{key}.geojson")),
                    out_dir: base_dir.join("data").join(key),
                })
                .collect(),
        }
    }

    fn rebase(&mut self, base: &Path) {
        rebase_path(&mut self.towns, base);
        for dataset in &mut self.datasets {
            rebase_path(&mut dataset.input, base);
            rebase_path(&mut dataset.out_dir, base);
        }
    }
}

fn rebase_path(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        let joined = base.join(&*path);
        *path = joined;
    }
}
