/// Data layer: design table types, parsing, normalization and derived values.
///
/// Architecture:
/// ```text
///   design .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse text → ExperimentTable (volumes numeric)
///   └──────────┘
///        │
///        ▼
///   ┌─────────────────┐
///   │ ExperimentTable  │  header schema, Vec<ExperimentRow>
///   └─────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  channel normalization, "NA" removal → TransferStep
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ derived   │  agar height, spiral offsets per step
///   └──────────┘
/// ```

pub mod derived;
pub mod filter;
pub mod loader;
pub mod model;
