use tracing::debug;
use wharf_config::shared::MetadataConfig;

use crate::error::WharfResult;
use crate::sql;
use crate::store::TargetStore;
use crate::types::{Cell, TableRef};

/// Advances one entity's watermark from its freshly staged rows.
///
/// The mark is recomputed inside the database from `MAX(create_dt)` of the staging
/// table and only ever moves forward; staging older data, or an empty staging
/// table, leaves the stored mark untouched. Returns whether the mark moved.
pub async fn advance_watermark(
    store: &dyn TargetStore,
    meta: &MetadataConfig,
    staging: &TableRef,
) -> WharfResult<bool> {
    let statement = sql::advance_watermark(meta, staging)?;
    let params = [
        Cell::String(staging.schema.clone()),
        Cell::String(staging.table.clone()),
    ];
    let affected = store.execute(&statement, &params).await?;

    if affected == 0 {
        debug!(
            schema = %staging.schema,
            table = %staging.table,
            "watermark unchanged"
        );
    }

    Ok(affected > 0)
}
