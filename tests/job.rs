use std::collections::VecDeque;
use std::io::{Cursor, Read};
use std::sync::Mutex;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use satfetch::domain::{BoundingBox, OutputFormat, Product, ProductId};
use satfetch::error::SatfetchError;
use satfetch::job::{Customization, JobHandle, JobPoller, JobService, JobState};

/// Replays a fixed status sequence for every submitted job.
struct ScriptedJobs {
    statuses: Mutex<VecDeque<&'static str>>,
    outputs: Vec<String>,
    submissions: Mutex<Vec<ProductId>>,
    streams: Mutex<Vec<String>>,
}

impl ScriptedJobs {
    fn new(statuses: &[&'static str]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            outputs: vec![
                "out/job-1/notes.txt".to_string(),
                "out/job-1/seviri_20220101_00_12.nc".to_string(),
            ],
            submissions: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
        }
    }
}

impl JobService for ScriptedJobs {
    fn submit(
        &self,
        product: &Product,
        _customization: &Customization,
    ) -> Result<JobHandle, SatfetchError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(product.id.clone());
        Ok(JobHandle::new(format!("job-{}", submissions.len())))
    }

    fn status(&self, _job: &JobHandle) -> Result<String, SatfetchError> {
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .map(str::to_string)
            .ok_or_else(|| SatfetchError::EumetsatHttp("script exhausted".to_string()))
    }

    fn outputs(&self, _job: &JobHandle) -> Result<Vec<String>, SatfetchError> {
        Ok(self.outputs.clone())
    }

    fn stream_output(
        &self,
        _job: &JobHandle,
        output: &str,
    ) -> Result<Box<dyn Read + Send>, SatfetchError> {
        self.streams.lock().unwrap().push(output.to_string());
        Ok(Box::new(Cursor::new(b"payload".to_vec())))
    }
}

fn product() -> Product {
    Product::new(
        "MSG4-SEVI-MSG15-0100-NA-20220101001241.868000000Z-NA"
            .parse()
            .unwrap(),
    )
}

fn customization() -> Customization {
    Customization {
        product_type: "HRSEVIRI".to_string(),
        format: OutputFormat::Netcdf4,
        roi: BoundingBox::default(),
    }
}

fn target_dir() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, dir)
}

#[test]
fn done_job_downloads_the_matching_output_once() {
    let jobs = ScriptedJobs::new(&["QUEUED", "RUNNING", "DONE"]);
    let (_temp, dir) = target_dir();
    let poller = JobPoller::new(&jobs, Duration::ZERO);

    let job = poller.run(&product(), &customization(), &dir).unwrap();

    assert_eq!(job.state, JobState::Done);
    let path = job.output_path.unwrap();
    assert_eq!(path, dir.join("seviri_20220101_00_12.nc"));
    assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    assert_eq!(
        *jobs.streams.lock().unwrap(),
        vec!["out/job-1/seviri_20220101_00_12.nc".to_string()]
    );
    assert_eq!(jobs.submissions.lock().unwrap().len(), 1);
}

#[test]
fn failed_job_returns_without_output() {
    let jobs = ScriptedJobs::new(&["QUEUED", "FAILED"]);
    let (_temp, dir) = target_dir();
    let poller = JobPoller::new(&jobs, Duration::ZERO);

    let job = poller.run(&product(), &customization(), &dir).unwrap();

    assert_eq!(job.state, JobState::Error);
    assert!(job.output_path.is_none());
    assert!(jobs.streams.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
}

#[test]
fn unmapped_status_is_an_error() {
    let jobs = ScriptedJobs::new(&["QUEUED", "PAUSED"]);
    let (_temp, dir) = target_dir();
    let poller = JobPoller::new(&jobs, Duration::ZERO);

    let result = poller.run(&product(), &customization(), &dir);

    assert_matches!(result, Err(SatfetchError::UnmappedJobStatus(raw)) if raw == "PAUSED");
    assert!(jobs.streams.lock().unwrap().is_empty());
}

#[test]
fn done_job_without_matching_output_is_a_remote_error() {
    let mut jobs = ScriptedJobs::new(&["DONE"]);
    jobs.outputs = vec!["out/job-1/notes.txt".to_string()];
    let (_temp, dir) = target_dir();
    let poller = JobPoller::new(&jobs, Duration::ZERO);

    let result = poller.run(&product(), &customization(), &dir);

    assert_matches!(result, Err(SatfetchError::RemoteJob { job_id, .. }) if job_id == "job-1");
}

#[test]
fn transport_failure_while_polling_propagates() {
    let jobs = ScriptedJobs::new(&["RUNNING"]);
    let (_temp, dir) = target_dir();
    let poller = JobPoller::new(&jobs, Duration::ZERO);

    assert_matches!(
        poller.run(&product(), &customization(), &dir),
        Err(SatfetchError::EumetsatHttp(_))
    );
}
