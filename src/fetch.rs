use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::Batch;
use crate::domain::{BoundingBox, OutputFormat, Product};
use crate::error::SatfetchError;
use crate::job::{Customization, JobPoller, JobService, JobState};

#[derive(Debug, Clone)]
pub struct FetchParams {
    pub product_type: String,
    pub bounding_box: BoundingBox,
    pub format: OutputFormat,
    pub poll_interval: Duration,
}

impl FetchParams {
    fn customization(&self) -> Customization {
        Customization {
            product_type: self.product_type.clone(),
            format: self.format,
            roi: self.bounding_box,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub item: Product,
    pub path: Option<Utf8PathBuf>,
}

impl FetchOutcome {
    pub fn is_fetched(&self) -> bool {
        self.path.is_some()
    }
}

pub struct FetchOrchestrator<'a, S: JobService> {
    service: &'a S,
}

impl<'a, S: JobService> FetchOrchestrator<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self { service }
    }

    pub fn fetch(
        &self,
        batch: &Batch,
        target_dir: &Utf8Path,
        params: &FetchParams,
    ) -> Result<Vec<FetchOutcome>, SatfetchError> {
        self.fetch_items(&batch.items, target_dir, params)
    }

    /// Fetches every item one after the other. Item failures become `path: None`.
    pub fn fetch_items(
        &self,
        items: &[Product],
        target_dir: &Utf8Path,
        params: &FetchParams,
    ) -> Result<Vec<FetchOutcome>, SatfetchError> {
        fs::create_dir_all(target_dir.as_std_path())
            .map_err(|err| SatfetchError::Filesystem(err.to_string()))?;

        let poller = JobPoller::new(self.service, params.poll_interval);
        let customization = params.customization();
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let path = match poller.run(item, &customization, target_dir) {
                Ok(job) if job.state == JobState::Done => job.output_path,
                Ok(_) => None,
                Err(err) => {
                    warn!(product = %item.id, error = %err, "fetch failed");
                    None
                }
            };
            outcomes.push(FetchOutcome {
                item: item.clone(),
                path,
            });
        }

        let fetched = outcomes.iter().filter(|outcome| outcome.is_fetched()).count();
        info!(
            fetched,
            failed = outcomes.len() - fetched,
            directory = %target_dir,
            "batch fetch finished"
        );
        Ok(outcomes)
    }
}
