use log::{debug, info};

use crate::config::DispersionConfig;
use crate::error::Result;
use crate::loss::center::CenterLoss;
use crate::math::matrix::Matrix;
use crate::viz::heatmap::CentroidVisualizer;

/// What a call to `CenterLoss::disperse` did.
#[derive(Debug, Clone, PartialEq)]
pub enum DispersionOutcome {
    /// The warm-up guard swallowed the call; `counter` is its new value.
    Skipped { counter: usize },
    Completed(DispersionReport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispersionReport {
    /// Rounds applied by this call.
    pub rounds: usize,
    /// `nupdate` after the last round.
    pub last_update: usize,
    /// Extremes of the last round's update, `None` if no round ran.
    pub update_min: Option<f64>,
    pub update_max: Option<f64>,
}

/// Similarity of two centroids at distance `d` in `feat_dim` dimensions:
/// `exp(-d) / (d * feat_dim)`, with non-finite values (a centroid against
/// itself) mapped to 0.
fn similarity(d: f64, feat_dim: f64) -> f64 {
    let w = (-d).exp() / (d * feat_dim);
    if w.is_finite() { w } else { 0.0 }
}

/// Repulsion for one block of rows against the whole table.
///
/// Contracts `minibatch[b, d]`, `sim[b, m]` and `-centers[f, d]` into
/// `update[b, d]`; `m` and `f` are summed independently, so
/// `update[b][d] = minibatch[b][d] * Σ_m sim[b][m] * Σ_f -centers[f][d]`.
pub fn repulsion(minibatch: &Matrix, centers: &Matrix) -> Matrix {
    let feat_dim = centers.cols as f64;
    let sim = minibatch.cdist(centers).map(|d| similarity(d, feat_dim));
    let weights = sim.row_sums();
    let pull: Vec<f64> = centers.column_sums().into_iter().map(|s| -s).collect();

    let data = minibatch.data.iter().zip(weights.iter())
        .map(|(row, w)| {
            row.iter().zip(pull.iter()).map(|(x, p)| x * w * p).collect()
        })
        .collect();
    Matrix { rows: minibatch.rows, cols: minibatch.cols, data }
}

/// The stacked repulsion of every `minibatch_size` block of `centers`.
pub fn dispersion_updates(centers: &Matrix, minibatch_size: usize) -> Matrix {
    let blocks: Vec<Matrix> = centers
        .row_chunks(minibatch_size)
        .iter()
        .map(|block| repulsion(block, centers))
        .collect();
    Matrix::vstack(&blocks)
}

impl CenterLoss {
    /// Pushes the centroids apart to counter collapse.
    ///
    /// Runs `config.factors × config.rounds_per_factor` rounds; each adds
    /// `dispersion_updates` to the table and renormalises every row to unit
    /// length. Each round hands before/update/after tables and the update
    /// report to `visualizer`, addressed under `config.base_dir`.
    ///
    /// The first `config.warmup_calls` calls only count themselves and return
    /// `Skipped`. If the visualizer fails, the error is returned and the
    /// table keeps every round that completed before the failing one;
    /// `nupdate` already counts the failing round.
    pub fn disperse<V>(&mut self, config: &DispersionConfig, visualizer: &mut V) -> Result<DispersionOutcome>
    where
        V: CentroidVisualizer + ?Sized,
    {
        config.validate()?;
        if self.counter < config.warmup_calls {
            self.counter += 1;
            debug!("dispersion warm-up {}/{}", self.counter, config.warmup_calls);
            return Ok(DispersionOutcome::Skipped { counter: self.counter });
        }
        self.counter = 0;

        let mut report = DispersionReport {
            rounds: 0,
            last_update: self.nupdate,
            update_min: None,
            update_max: None,
        };

        for factor in 0..config.factors {
            let name = config.factor_dir(factor);
            for _ in 0..config.rounds_per_factor {
                self.nupdate += 1;
                let n = self.nupdate.to_string();
                debug!("dispersing centers: factor {factor}, update {n}");

                visualizer.render(self.centers(), &name.join("before").join(&n))?;

                let updates = dispersion_updates(self.centers(), config.minibatch_size);
                let outdir = name.join("update").join(&n);
                visualizer.render(&updates, &outdir)?;
                visualizer.report(&updates, &outdir)?;

                let next = (self.centers() + &updates).normalize_rows();
                self.table_mut().replace_no_grad(next)?;

                visualizer.render(self.centers(), &name.join("after").join(&n))?;

                report.rounds += 1;
                report.last_update = self.nupdate;
                report.update_min = updates.min();
                report.update_max = updates.max();
            }
        }

        info!(
            "dispersed {} centers over {} rounds (update range {:?}..{:?})",
            self.num_classes(),
            report.rounds,
            report.update_min,
            report.update_max,
        );
        Ok(DispersionOutcome::Completed(report))
    }
}
