use std::time::Duration;

use chrono::Utc;

use crate::error::MediaError;
use crate::models::record::Owner;
use crate::services::context::ContextResolver;
use crate::services::records::FileRecordStore;
use crate::services::storage::{delete_all, DiskRegistry};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub records: usize,
    pub files: usize,
}

/// Soft delete of an owner's records and the periodic hard purge of old ones.
#[derive(Clone)]
pub struct CleanupService {
    records: FileRecordStore,
    resolver: ContextResolver,
    disks: DiskRegistry,
}

impl CleanupService {
    pub fn new(records: FileRecordStore, resolver: ContextResolver, disks: DiskRegistry) -> Self {
        Self {
            records,
            resolver,
            disks,
        }
    }

    /// Marks every active record of `owner` deleted. Files stay on disk
    /// until the purge picks the records up.
    pub async fn soft_delete_owner_files(&self, owner: Owner) -> Result<u64, MediaError> {
        let affected = self.records.soft_delete_owner(owner).await?;
        tracing::info!(owner = %owner.id, entity = %owner.entity, affected, "soft deleted file records");
        Ok(affected)
    }

    /// Deletes the files and rows of records soft-deleted more than
    /// `retention` ago. A record whose disk cannot be resolved is left for
    /// the next run.
    pub async fn purge_deleted(&self, retention: chrono::Duration) -> Result<PurgeReport, MediaError> {
        let threshold = Utc::now().naive_utc() - retention;
        let expired = self.records.deleted_before(threshold).await?;

        if expired.is_empty() {
            return Ok(PurgeReport::default());
        }

        tracing::info!(count = expired.len(), "purging soft deleted file records");

        let mut report = PurgeReport::default();
        for record in expired {
            let store = match self
                .resolver
                .disk_for(record.owner.entity)
                .and_then(|disk| self.disks.get(&disk))
            {
                Ok(store) => store,
                Err(e) => {
                    tracing::warn!(record = %record.id, error = %e, "no disk for record, skipping");
                    continue;
                }
            };

            report.files += delete_all(store.as_ref(), &record.names.leaves()).await;
            self.records.delete(&record).await?;
            report.records += 1;
        }

        Ok(report)
    }

    pub async fn run_scheduler(self, every: Duration, retention: chrono::Duration) {
        tracing::info!(every = ?every, "cleanup scheduler started");
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;

            match self.purge_deleted(retention).await {
                Ok(report) if report.records > 0 => {
                    tracing::info!(records = report.records, files = report.files, "purge finished");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "purge failed"),
            }
        }
    }
}
