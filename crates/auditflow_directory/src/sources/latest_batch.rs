use super::RosterSource;
use crate::error::{DirectoryError, Result};
use crate::roster::{first_delimited, parse_roster};
use async_trait::async_trait;
use auditflow_intake::{BatchCatalog, Classifier};
use tracing::debug;

/// The roster-like tabular file in the most recently staged batch.
pub struct LatestBatchRosterSource {
    catalog: BatchCatalog,
    classifier: Classifier,
}

impl LatestBatchRosterSource {
    pub fn new(catalog: BatchCatalog, classifier: Classifier) -> Self {
        Self {
            catalog,
            classifier,
        }
    }
}

#[async_trait]
impl RosterSource for LatestBatchRosterSource {
    fn describe(&self) -> String {
        "latest-batch".to_string()
    }

    async fn names(&self) -> Result<Vec<String>> {
        let catalog = self.catalog.clone();
        let latest = tokio::task::spawn_blocking(move || catalog.latest())
            .await
            .map_err(|err| DirectoryError::Task(err.to_string()))??;
        let Some(batch) = latest else {
            return Ok(Vec::new());
        };

        // First delimited roster file in upload order.
        let Some((file, delimiter)) =
            first_delimited(batch.roster_files(&self.classifier), |file| file.saved_name.as_str())
        else {
            debug!(batch_id = %batch.batch_id, "Newest batch has no delimited roster file");
            return Ok(Vec::new());
        };

        let path = batch.path_of(file);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| DirectoryError::io(&path, err))?;
        debug!(batch_id = %batch.batch_id, file = %file.saved_name, "Reading roster from batch");
        parse_roster(&bytes, delimiter, &file.relative_path)
    }
}
