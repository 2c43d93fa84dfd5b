//! Per-stage counters, recorded through the `metrics` facade.
//!
//! Only compiled with the `metrics` feature. Install any `metrics`
//! recorder to export them.

use metrics::counter;

/// Items a stage took off its queue and handled
pub const STAGE_ITEMS: &str = "powerflow_stage_items_total";
/// Items whose stage function (or sink) failed in that stage
pub const STAGE_FAULTS: &str = "powerflow_stage_faults_total";
/// Items dropped unprocessed because of cancellation
pub const STAGE_DISCARDED: &str = "powerflow_stage_discarded_total";

pub(crate) fn record_item(stage: &str) {
    counter!(STAGE_ITEMS, "stage" => stage.to_string()).increment(1);
}

pub(crate) fn record_fault(stage: &str) {
    counter!(STAGE_FAULTS, "stage" => stage.to_string()).increment(1);
}

pub(crate) fn record_discarded(stage: &str, count: usize) {
    counter!(STAGE_DISCARDED, "stage" => stage.to_string()).increment(count as u64);
}
