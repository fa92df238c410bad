// ============================================================
// Infrastructure Layer
// ============================================================
// Cross-cutting persistence and observability:
//
//   checkpoint.rs — versioned single-file checkpoint bundles
//                   (weights + optimizer moments + metric history)
//                   plus the train_config.json sidecar
//
//   metrics.rs    — per-epoch metric rows, the append-only history
//                   persisted in checkpoints, and the CSV sink
//
//   sampler.rs    — fixed-latent sample grids written as PNGs

/// Checkpoint bundle record and its save/load manager
pub mod checkpoint;

/// Step/epoch metrics, metric history, CSV logger
pub mod metrics;

/// Denormalization and sample-grid PNG writer
pub mod sampler;
