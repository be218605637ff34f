// Trains embeddings on synthetic clustered data with center loss.
//
//   ferrite-centers [CONFIG.json] [OUT_DIR]
//
// Without a config the defaults from `RunConfig::default()` are used. The
// centroid checkpoint and the resolved config are written to OUT_DIR
// (default `./ferrite-centers-out`). Set RUST_LOG=info to see progress.
use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use log::info;
use rand::{rngs::StdRng, SeedableRng};

use ferrite_centers::{
    train::gaussian_blobs,
    train_loop, HeatmapVisualizer, RunConfig, Sgd, TrainConfig,
};

const DEFAULT_OUT_DIR: &str = "ferrite-centers-out";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let config = match args.next() {
        Some(path) => RunConfig::load_json(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => RunConfig::default(),
    };
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_OUT_DIR.to_string()));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut center_loss = config.center_loss.build().context("building center loss")?;
    info!(
        "center loss: {} classes x {} dims, alpha = {}",
        center_loss.num_classes(),
        center_loss.feat_dim(),
        center_loss.alpha()
    );

    let mut rng = match config.center_loss.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let (mut embeddings, labels) = gaussian_blobs(
        config.center_loss.num_classes,
        config.center_loss.feat_dim,
        config.train.samples_per_class,
        config.train.spread,
        &mut rng,
    );
    info!("generated {} samples", labels.len());

    let train_config = TrainConfig {
        dispersion: config.dispersion.clone(),
        ..TrainConfig::new(config.train.epochs, config.train.batch_size)
    };
    let optimizer = Sgd::new(config.train.learning_rate);
    let last_loss = train_loop(
        &mut center_loss,
        &mut embeddings,
        &labels,
        &optimizer,
        &train_config,
        &mut HeatmapVisualizer,
    )
    .context("training")?;

    let checkpoint = out_dir.join("centers.json");
    center_loss.save_json(&checkpoint)
        .with_context(|| format!("writing {}", checkpoint.display()))?;
    config.save_json(out_dir.join("config.json")).context("writing resolved config")?;

    println!("final loss per sample: {last_loss:.6}");
    println!("centroids saved to {}", checkpoint.display());
    Ok(())
}
