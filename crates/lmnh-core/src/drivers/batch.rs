use anyhow::Result;
use tracing::{error, info};

use crate::archive::ArchiveRow;
use crate::loader::Loader;

use super::{load_record, LoadSummary, RowReport};

/// Load archive rows in order. `limit` of `None` loads every row.
///
/// `on_row` is called after each row, e.g. to tick a progress bar.
pub async fn run_batch<F>(
    loader: &Loader,
    rows: &[ArchiveRow],
    limit: Option<usize>,
    mut on_row: F,
) -> Result<LoadSummary>
where
    F: FnMut(&RowReport),
{
    let mut summary = LoadSummary::default();

    for (index, row) in rows.iter().take(limit.unwrap_or(usize::MAX)).enumerate() {
        let raw = row.to_raw_record();
        let report = load_record(loader, &raw).await?;
        if let RowReport::Invalid(err) = &report {
            error!(row = index + 1, record = %raw, "Invalid archive row: {err}");
        }
        summary.record(&report);
        on_row(&report);
    }

    info!("{}", summary.skipped_message());
    Ok(summary)
}
