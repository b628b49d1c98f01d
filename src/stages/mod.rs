// file: src/stages/mod.rs
// description: stage operators that validate preconditions and compute record deltas
// reference: internal module structure

pub mod clean;
pub mod ingest;
pub mod scale;
pub mod split;
pub mod train;

pub use clean::{CleanReport, CleanRequest, CleanStrategy, CleaningInfo};
pub use ingest::{DatasetInfo, IngestReport};
pub use scale::{PreprocessingInfo, ScaleReport, ScaleRequest, ScalerKind};
pub use split::{SplitData, SplitReport, SplitRequest};
pub use train::{TrainReport, TrainingState};

use crate::store::RecordUpdate;

/// What a stage hands back to the façade: the caller-facing report and the
/// field groups to merge into the record.
#[derive(Debug)]
pub struct StageOutput<R> {
    pub report: R,
    pub update: RecordUpdate,
}
