// ============================================================
// Data Pipeline
// ============================================================
// From image files on disk to device tensors:
//
//   image files
//       │
//       ▼
//   ImageFolderLoader  → decodes, resizes, normalizes to [-1, 1]
//       │
//       ▼
//   ImageDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   ImageBatcher       → stacks samples into [B, 3, H, W]
//       │
//       ▼
//   ImageLoader        → shuffled full-batch feed per epoch
//
// The feed is deliberately thin: the training loop is the consumer
// and owns the schedule; this layer only decodes and stacks.

/// Decodes image files from a directory via the `image` crate
pub mod loader;

/// Implements Burn's Dataset trait for decoded image samples
pub mod dataset;

/// Stacks samples into tensors and deals shuffled epoch batches
pub mod batcher;
