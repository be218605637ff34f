pub mod dataset;
pub mod epoch_stats;
pub mod train_config;
pub mod loop_fn;

pub use dataset::gaussian_blobs;
pub use epoch_stats::EpochStats;
pub use train_config::TrainConfig;
pub use loop_fn::train_loop;
