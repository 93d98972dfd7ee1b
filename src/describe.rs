//! Description backfill for scholarships that have none yet.

use serde::Serialize;

use crate::llm::DescriptionWriter;
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DescribeReport {
    pub updated: usize,
    pub failed: usize,
}

/// Ask `writer` for a description of every scholarship lacking one. A failure
/// on one entity is logged and the rest continue.
pub async fn fill_missing_descriptions(
    store: &dyn Store,
    writer: &dyn DescriptionWriter,
) -> anyhow::Result<DescribeReport> {
    let pending = store.scholarships_missing_description().await?;
    let mut report = DescribeReport::default();

    for s in pending {
        let text = match writer.describe(&s).await {
            Ok(t) if !t.trim().is_empty() => t,
            Ok(_) => {
                tracing::warn!(id = s.id, "empty description returned");
                report.failed += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(id = s.id, error = %e, "description generation failed");
                report.failed += 1;
                continue;
            }
        };
        match store.set_scholarship_description(s.id, text.trim()).await {
            Ok(()) => report.updated += 1,
            Err(e) => {
                tracing::warn!(id = s.id, error = %e, "saving description failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(updated = report.updated, failed = report.failed, "description backfill finished");
    Ok(report)
}
