use std::sync::mpsc;
use std::sync::{Arc, atomic::AtomicBool};
use crate::config::DispersionConfig;
use crate::train::epoch_stats::EpochStats;

/// Settings for one `train_loop` run over an embedding table.
///
/// `epochs` shuffled passes are made over the embeddings, `batch_size` rows
/// per `CenterLoss::forward` call (`1` updates the centroids after every
/// sample). With `dispersion` set, the centroids are pushed apart after each
/// epoch.
///
/// The run ends before `epochs` when `stop_flag` reads `true` at the start of
/// an epoch, or when the `progress_tx` receiver is gone by the time that
/// epoch's `EpochStats` is sent.
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub dispersion: Option<DispersionConfig>,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl TrainConfig {
    /// Plain mini-batch training: no dispersion, no progress reporting, no stop flag.
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        TrainConfig {
            epochs,
            batch_size,
            dispersion: None,
            progress_tx: None,
            stop_flag: None,
        }
    }
}
