use chrono::SubsecRound;

use crate::types::{NormalizedRow, ValidatedRecord};

/// Convert a validated record into the row shape the loader stores.
///
/// Sub-second precision is dropped, so two events within the same second at
/// the same site with the same value share a dedup key.
pub fn normalize(record: &ValidatedRecord) -> NormalizedRow {
    NormalizedRow {
        event_at: record.occurred_at.trunc_subsecs(0),
        site: record.site,
        value: record.value,
    }
}
