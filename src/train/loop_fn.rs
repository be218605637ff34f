use std::sync::atomic::Ordering;
use std::time::Instant;

use log::{info, warn};
use rand::seq::SliceRandom;

use crate::error::{CenterLossError, Result};
use crate::loss::center::CenterLoss;
use crate::loss::dispersion::DispersionOutcome;
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;
use crate::viz::heatmap::CentroidVisualizer;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains a table of per-sample embeddings against `center_loss` for
/// `config.epochs` epochs and returns the mean per-sample loss of the
/// **last completed epoch**.
///
/// Each mini-batch calls `CenterLoss::forward` (which also moves the
/// centroids) and then takes one SGD step on the batch's embedding rows
/// using the loss gradient.
///
/// # Arguments
/// - `center_loss` — the loss module; its centroids move in place
/// - `embeddings`  — `n × feat_dim` learnable features, modified in place
/// - `labels`      — class index of each embedding row
/// - `optimizer`   — SGD optimizer (carries learning rate)
/// - `config`      — hyperparameters, optional dispersion, progress channel, stop flag
/// - `visualizer`  — renders dispersion debug output; unused without dispersion
///
/// # Early termination
/// The loop breaks early if:
/// - the `progress_tx` receiver has been dropped, **or**
/// - `config.stop_flag` is set to `true`.
pub fn train_loop<V>(
    center_loss: &mut CenterLoss,
    embeddings: &mut Matrix,
    labels: &[usize],
    optimizer: &Sgd,
    config: &TrainConfig,
    visualizer: &mut V,
) -> Result<f64>
where
    V: CentroidVisualizer + ?Sized,
{
    if labels.is_empty() {
        return Err(CenterLossError::InvalidInput("labels must not be empty".into()));
    }
    if embeddings.rows != labels.len() {
        return Err(CenterLossError::ShapeMismatch {
            what: "embeddings",
            expected: labels.len(),
            got: embeddings.rows,
        });
    }
    if config.batch_size == 0 {
        return Err(CenterLossError::InvalidInput("batch_size must be at least 1".into()));
    }

    let mut last_train_loss = 0.0;

    for epoch in 1..=config.epochs {
        if stop_requested(config) {
            break;
        }

        let t_start = Instant::now();

        let train_loss = run_one_epoch(center_loss, embeddings, labels, optimizer, config.batch_size)?;
        last_train_loss = train_loss;

        let dispersed = match &config.dispersion {
            Some(dispersion) => matches!(
                center_loss.disperse(dispersion, &mut *visualizer)?,
                DispersionOutcome::Completed(_)
            ),
            None => false,
        };

        let elapsed_ms = t_start.elapsed().as_millis() as u64;

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            mean_center_norm: mean_row_norm(center_loss.centers()),
            dispersed,
            elapsed_ms,
        };
        info!(
            "epoch {}/{}: loss = {:.6}, mean center norm = {:.4}",
            stats.epoch, stats.total_epochs, stats.train_loss, stats.mean_center_norm
        );

        if let Some(ref tx) = config.progress_tx {
            if tx.send(stats).is_err() {
                warn!("progress receiver dropped, stopping after epoch {epoch}");
                break;
            }
        }
    }

    Ok(last_train_loss)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn stop_requested(config: &TrainConfig) -> bool {
    config.stop_flag
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Runs one full epoch of mini-batch SGD over the embeddings.
/// Returns the mean loss per sample.
fn run_one_epoch(
    center_loss: &mut CenterLoss,
    embeddings: &mut Matrix,
    labels: &[usize],
    optimizer: &Sgd,
    batch_size: usize,
) -> Result<f64> {
    let n = labels.len();
    let mut total_loss = 0.0;

    // Shuffle sample order each epoch.
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rand::thread_rng());

    for batch in indices.chunks(batch_size) {
        let features = embeddings.index_select(batch);
        let batch_labels: Vec<usize> = batch.iter().map(|&i| labels[i]).collect();

        let out = center_loss.forward(&features, &batch_labels)?;
        total_loss += out.loss;

        optimizer.step_rows(embeddings, batch, &out.grad());
    }

    Ok(total_loss / n as f64)
}

fn mean_row_norm(m: &Matrix) -> f64 {
    if m.rows == 0 {
        return 0.0;
    }
    (0..m.rows).map(|i| m.row_norm(i)).sum::<f64>() / m.rows as f64
}
