use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{CatalogClient, CountMismatch, TimeWindowBatcher};
use crate::config::{FilesRequest, IdsRequest, VerifyRequest};
use crate::domain::TimeRange;
use crate::error::SatfetchError;
use crate::fetch::{FetchOrchestrator, FetchOutcome};
use crate::fs_util::{read_lines, visit_files, write_lines};
use crate::integrity::{IntegrityValidator, VerificationResult};
use crate::job::JobService;
use crate::parser::{DateTimeParser, FilePathParser, SeviriIdParser};

#[derive(Debug, Clone, Serialize)]
pub struct IdsResult {
    pub output: Utf8PathBuf,
    pub written: usize,
    pub batches: usize,
    pub expected: u64,
    pub retrieved: u64,
    pub mismatch: Option<CountMismatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilesResult {
    pub output_directory: Utf8PathBuf,
    pub fetched: usize,
    pub failed: usize,
    pub expected: u64,
    pub mismatch: Option<CountMismatch>,
    pub outcomes: Vec<FetchOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub directory: Utf8PathBuf,
    pub candidates: usize,
    pub reference: Option<usize>,
    #[serde(flatten)]
    pub result: VerificationResult<NaiveDateTime>,
}

pub struct App<C: CatalogClient, J: JobService> {
    catalog: C,
    jobs: J,
}

impl<C: CatalogClient, J: JobService> App<C, J> {
    pub fn new(catalog: C, jobs: J) -> Self {
        Self { catalog, jobs }
    }

    /// Lists product ids over the requested range and writes them one per line.
    pub fn fetch_ids(&self, request: &IdsRequest) -> Result<IdsResult, SatfetchError> {
        let mut batcher = TimeWindowBatcher::new(&self.catalog, request.window);
        if let Some(polygon) = &request.polygon {
            batcher = batcher.geo(polygon.clone());
        }
        let mut batches = batcher.run(request.start, request.end)?;

        write_lines(&request.output, std::iter::empty::<&str>(), false)?;
        let mut written = 0;
        let mut seen = 0;
        for batch in batches.by_ref() {
            let batch = batch?;
            written += write_lines(
                &request.output,
                batch.items.iter().map(|item| &item.id),
                true,
            )?;
            seen += 1;
        }
        info!(written, output = %request.output, "product ids written");

        Ok(IdsResult {
            output: request.output.clone(),
            written,
            batches: seen,
            expected: batches.expected(),
            retrieved: batches.retrieved(),
            mismatch: batches.mismatch(),
        })
    }

    pub fn fetch_files(&self, request: &FilesRequest) -> Result<FilesResult, SatfetchError> {
        let batcher = TimeWindowBatcher::new(&self.catalog, request.window);
        let mut batches = batcher.run(request.start, request.end)?;
        let orchestrator = FetchOrchestrator::new(&self.jobs);

        let mut outcomes = Vec::new();
        for batch in batches.by_ref() {
            let batch = batch?;
            outcomes.extend(orchestrator.fetch(
                &batch,
                &request.output_directory,
                &request.params,
            )?);
        }

        let fetched = outcomes.iter().filter(|outcome| outcome.is_fetched()).count();
        Ok(FilesResult {
            output_directory: request.output_directory.clone(),
            fetched,
            failed: outcomes.len() - fetched,
            expected: batches.expected(),
            mismatch: batches.mismatch(),
            outcomes,
        })
    }

    /// Checks a local archive for missing timestamps and size-corrupted files.
    pub fn verify(&self, request: &VerifyRequest) -> Result<VerifyResult, SatfetchError> {
        let candidates = visit_files(&request.directory, request.pattern.as_deref(), true)?;
        let candidates: Vec<Utf8PathBuf> = match &request.period {
            Some(period) => candidates
                .into_iter()
                .filter(|path| {
                    FilePathParser::parse_path(path)
                        .map(|instant| period.contains(instant))
                        .unwrap_or(false)
                })
                .collect(),
            None => candidates,
        };

        let reference = request
            .reference
            .as_ref()
            .map(|path| read_reference(path, request.period.as_ref()))
            .transpose()?;
        let reference_len = reference.as_ref().map(BTreeSet::len);

        let validator = IntegrityValidator::with_transform(
            request.settings,
            reference,
            FilePathParser::parse_path,
        )?;
        let result = validator.verify(&candidates)?;

        Ok(VerifyResult {
            directory: request.directory.clone(),
            candidates: candidates.len(),
            reference: reference_len,
            result,
        })
    }
}

fn read_reference(
    path: &Utf8Path,
    period: Option<&TimeRange>,
) -> Result<BTreeSet<NaiveDateTime>, SatfetchError> {
    let mut reference = BTreeSet::new();
    for line in read_lines(path)? {
        let instant = SeviriIdParser::parse(&line)?;
        if period.is_none_or(|period| period.contains(instant)) {
            reference.insert(instant);
        }
    }
    if reference.is_empty() {
        warn!(path = %path, "reference file yields no timestamps");
    }
    Ok(reference)
}
