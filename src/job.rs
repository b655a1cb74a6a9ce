use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{BoundingBox, OutputFormat, Product, ProductId};
use crate::error::SatfetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
}

impl JobState {
    /// Maps a raw remote status onto the four job states. Unknown statuses are an error.
    pub fn classify(raw: &str) -> Result<Self, SatfetchError> {
        let normalized = raw.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "QUEUED" => Ok(JobState::Queued),
            "RUNNING" => Ok(JobState::Running),
            "DONE" => Ok(JobState::Done),
            "ERROR" | "FAILED" | "CANCELLED" | "KILLED" | "DELETED" | "INACTIVE" => {
                Ok(JobState::Error)
            }
            _ => Err(SatfetchError::UnmappedJobStatus(raw.to_string())),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::Done => write!(f, "done"),
            JobState::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data Tailor chain applied to a product: target format and region of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Customization {
    pub product_type: String,
    pub format: OutputFormat,
    pub roi: BoundingBox,
}

pub trait JobService: Send + Sync {
    fn submit(
        &self,
        product: &Product,
        customization: &Customization,
    ) -> Result<JobHandle, SatfetchError>;
    fn status(&self, job: &JobHandle) -> Result<String, SatfetchError>;
    fn outputs(&self, job: &JobHandle) -> Result<Vec<String>, SatfetchError>;
    fn stream_output(
        &self,
        job: &JobHandle,
        output: &str,
    ) -> Result<Box<dyn Read + Send>, SatfetchError>;
}

impl<T: JobService + ?Sized> JobService for Arc<T> {
    fn submit(
        &self,
        product: &Product,
        customization: &Customization,
    ) -> Result<JobHandle, SatfetchError> {
        (**self).submit(product, customization)
    }

    fn status(&self, job: &JobHandle) -> Result<String, SatfetchError> {
        (**self).status(job)
    }

    fn outputs(&self, job: &JobHandle) -> Result<Vec<String>, SatfetchError> {
        (**self).outputs(job)
    }

    fn stream_output(
        &self,
        job: &JobHandle,
        output: &str,
    ) -> Result<Box<dyn Read + Send>, SatfetchError> {
        (**self).stream_output(job, output)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchJob {
    pub item_id: ProductId,
    pub state: JobState,
    pub output_path: Option<Utf8PathBuf>,
}

impl FetchJob {
    fn queued(item_id: ProductId) -> Self {
        Self {
            item_id,
            state: JobState::Queued,
            output_path: None,
        }
    }
}

pub struct JobPoller<'a, S: JobService> {
    service: &'a S,
    interval: Duration,
}

impl<'a, S: JobService> JobPoller<'a, S> {
    pub fn new(service: &'a S, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Submits one job and polls it until it is terminal.
    ///
    /// A job ending in [`JobState::Error`] is returned as `Ok` without an
    /// output path; transport failures and unmapped statuses are `Err`.
    pub fn run(
        &self,
        product: &Product,
        customization: &Customization,
        target_dir: &Utf8Path,
    ) -> Result<FetchJob, SatfetchError> {
        let handle = self.service.submit(product, customization)?;
        let mut job = FetchJob::queued(product.id.clone());
        info!(product = %product.id, job = %handle, "start downloading product");

        loop {
            let raw = self.service.status(&handle)?;
            let state = JobState::classify(&raw)?;
            if state != job.state {
                debug!(job = %handle, from = %job.state, to = %state, "job state changed");
            }
            job.state = state;
            match state {
                JobState::Queued | JobState::Running => {
                    info!(job = %handle, "job is {state}");
                    thread::sleep(self.interval);
                }
                JobState::Done => {
                    let path = self.download(&handle, customization.format, target_dir)?;
                    job.output_path = Some(path);
                    return Ok(job);
                }
                JobState::Error => {
                    warn!(
                        job = %handle,
                        product = %product.id,
                        "job failed, error code is: '{}'",
                        raw.trim().to_ascii_lowercase()
                    );
                    return Ok(job);
                }
            }
        }
    }

    fn download(
        &self,
        handle: &JobHandle,
        format: OutputFormat,
        target_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, SatfetchError> {
        let outputs = self.service.outputs(handle)?;
        let output = outputs
            .iter()
            .find(|name| name.ends_with(format.extension()))
            .ok_or_else(|| SatfetchError::RemoteJob {
                job_id: handle.to_string(),
                message: format!("no output with extension {}", format.extension()),
            })?;
        let file_name = output
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SatfetchError::RemoteJob {
                job_id: handle.to_string(),
                message: format!("invalid output name: {output}"),
            })?;
        let destination = target_dir.join(file_name);

        let mut stream = self.service.stream_output(handle, output)?;
        let mut temp = tempfile::Builder::new()
            .prefix(".satfetch")
            .tempfile_in(target_dir.as_std_path())
            .map_err(|err| SatfetchError::Filesystem(err.to_string()))?;
        io::copy(&mut stream, temp.as_file_mut())
            .map_err(|err| SatfetchError::Filesystem(err.to_string()))?;
        temp.persist(destination.as_std_path())
            .map_err(|err| SatfetchError::Filesystem(err.to_string()))?;
        info!(path = %destination, "wrote file to disk");
        Ok(destination)
    }
}
