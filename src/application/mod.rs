// ============================================================
// Application / Use Cases
// ============================================================
// Workflow coordination only: the CLI hands a config to one of
// these and they wire the data, ml, and infra layers together.

// The training workflow
pub mod train_use_case;

// The checkpoint-sampling workflow
pub mod sample_use_case;
