use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, SeedableRng};
use serde::{Serialize, Deserialize};

use crate::error::{CenterLossError, Result};
use crate::loss::center::{CenterLoss, DEFAULT_ALPHA};

/// Shape and step size of a `CenterLoss`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CenterLossConfig {
    pub num_classes: usize,
    pub feat_dim: usize,
    /// Centroid moving-average step size.
    pub alpha: f64,
    /// Seeds the centroid initialisation; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for CenterLossConfig {
    fn default() -> Self {
        CenterLossConfig { num_classes: 10, feat_dim: 16, alpha: DEFAULT_ALPHA, seed: None }
    }
}

impl CenterLossConfig {
    pub fn build(&self) -> Result<CenterLoss> {
        match self.seed {
            Some(seed) => CenterLoss::with_rng(
                self.num_classes,
                self.feat_dim,
                self.alpha,
                &mut StdRng::seed_from_u64(seed),
            ),
            None => CenterLoss::new(self.num_classes, self.feat_dim, self.alpha),
        }
    }
}

/// Parameters of the centroid dispersion routine.
///
/// Debug artefacts land under
/// `<base_dir>/debug/centers_factor<3^factor>/{before,update,after}/<n>/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispersionConfig {
    pub base_dir: PathBuf,
    /// Number of outer passes; pass `f` writes under `centers_factor<3^f>`.
    pub factors: u32,
    pub rounds_per_factor: usize,
    /// Rows of the centroid table per distance computation.
    pub minibatch_size: usize,
    /// Calls to skip (counting them) before a dispersion actually runs.
    /// `0` runs on every call.
    pub warmup_calls: usize,
}

impl Default for DispersionConfig {
    fn default() -> Self {
        DispersionConfig {
            base_dir: PathBuf::from("."),
            factors: 10,
            rounds_per_factor: 100,
            minibatch_size: 1000,
            warmup_calls: 0,
        }
    }
}

impl DispersionConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        DispersionConfig { base_dir: base_dir.into(), ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.minibatch_size == 0 {
            return Err(CenterLossError::InvalidInput("minibatch_size must be at least 1".into()));
        }
        if 3u64.checked_pow(self.factors.saturating_sub(1)).is_none() {
            return Err(CenterLossError::InvalidInput(format!(
                "factors = {} overflows the factor directory name",
                self.factors
            )));
        }
        Ok(())
    }

    /// `<base_dir>/debug/centers_factor<3^factor>`.
    pub fn factor_dir(&self, factor: u32) -> PathBuf {
        self.base_dir
            .join("debug")
            .join(format!("centers_factor{}", 3u64.pow(factor)))
    }
}

/// Settings for the embedding trainer driven by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainSettings {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Synthetic samples generated per class.
    pub samples_per_class: usize,
    /// Standard deviation of the synthetic samples around their class mean.
    pub spread: f64,
}

impl Default for TrainSettings {
    fn default() -> Self {
        TrainSettings {
            epochs: 20,
            batch_size: 32,
            learning_rate: 0.05,
            samples_per_class: 50,
            spread: 0.5,
        }
    }
}

/// Everything one run of the `ferrite-centers` binary needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub center_loss: CenterLossConfig,
    pub train: TrainSettings,
    /// Dispersion runs after every epoch when present.
    pub dispersion: Option<DispersionConfig>,
}

impl RunConfig {
    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a config; missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<RunConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
