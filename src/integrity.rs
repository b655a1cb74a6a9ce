use std::collections::BTreeSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SatfetchError;

pub type Transform<T> = Box<dyn Fn(&Utf8Path) -> Result<T, SatfetchError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegritySettings {
    /// Expected size in bytes. `None` disables the corrupted-file search.
    #[serde(default)]
    pub nominal_size: Option<u64>,
    /// Maximum relative size deviation before a file counts as corrupted.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Worker threads used for size lookups; `1` keeps everything on the caller's thread.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

fn default_tolerance() -> f64 {
    0.01
}

fn default_parallelism() -> usize {
    1
}

impl Default for IntegritySettings {
    fn default() -> Self {
        Self {
            nominal_size: None,
            tolerance: default_tolerance(),
            parallelism: default_parallelism(),
        }
    }
}

/// `None` in either half means that check was not requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult<T> {
    pub missing: Option<BTreeSet<T>>,
    pub corrupted: Option<BTreeSet<Utf8PathBuf>>,
}

pub struct IntegrityValidator<T> {
    settings: IntegritySettings,
    reference: Option<BTreeSet<T>>,
    transform: Transform<T>,
}

impl IntegrityValidator<Utf8PathBuf> {
    pub fn identity(
        settings: IntegritySettings,
        reference: Option<BTreeSet<Utf8PathBuf>>,
    ) -> Result<Self, SatfetchError> {
        Self::with_transform(settings, reference, |path: &Utf8Path| Ok(path.to_path_buf()))
    }
}

impl<T: Ord + Clone> IntegrityValidator<T> {
    pub fn with_transform<F>(
        settings: IntegritySettings,
        reference: Option<BTreeSet<T>>,
        transform: F,
    ) -> Result<Self, SatfetchError>
    where
        F: Fn(&Utf8Path) -> Result<T, SatfetchError> + Send + Sync + 'static,
    {
        if settings.tolerance.is_nan() || settings.tolerance < 0.0 {
            return Err(SatfetchError::Configuration(format!(
                "tolerance must be non-negative, got {}",
                settings.tolerance
            )));
        }
        if settings.parallelism == 0 {
            return Err(SatfetchError::Configuration(
                "parallelism must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            settings,
            reference,
            transform: Box::new(transform),
        })
    }

    pub fn verify(
        &self,
        candidates: &[Utf8PathBuf],
    ) -> Result<VerificationResult<T>, SatfetchError> {
        let missing = self.find_missing(candidates);
        let corrupted = self.find_corrupted(candidates)?;
        info!(
            candidates = candidates.len(),
            missing = missing.as_ref().map(BTreeSet::len),
            corrupted = corrupted.as_ref().map(BTreeSet::len),
            "verification finished"
        );
        Ok(VerificationResult { missing, corrupted })
    }

    pub fn find_missing(&self, candidates: &[Utf8PathBuf]) -> Option<BTreeSet<T>> {
        let reference = self.reference.as_ref()?;
        let present = candidates
            .iter()
            .filter_map(|path| match (self.transform)(path.as_path()) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(path = %path, error = %err, "could not transform candidate file");
                    None
                }
            })
            .collect::<BTreeSet<_>>();
        Some(reference.difference(&present).cloned().collect())
    }

    pub fn find_corrupted(
        &self,
        candidates: &[Utf8PathBuf],
    ) -> Result<Option<BTreeSet<Utf8PathBuf>>, SatfetchError> {
        let Some(nominal_size) = self.settings.nominal_size else {
            return Ok(None);
        };
        let sizes = self.file_sizes(candidates)?;
        let corrupted = candidates
            .iter()
            .zip(sizes)
            .filter(|(path, size)| match size {
                Some(size) => is_corrupted(*size, nominal_size, self.settings.tolerance),
                None => {
                    warn!(path = %path, "could not read file size, marking as corrupted");
                    true
                }
            })
            .map(|(path, _)| path.clone())
            .collect();
        Ok(Some(corrupted))
    }

    fn file_sizes(&self, candidates: &[Utf8PathBuf]) -> Result<Vec<Option<u64>>, SatfetchError> {
        if self.settings.parallelism == 1 {
            return Ok(candidates.iter().map(|path| file_size(path)).collect());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.parallelism)
            .build()
            .map_err(|err| {
                SatfetchError::Configuration(format!("failed to build worker pool: {err}"))
            })?;
        Ok(pool.install(|| candidates.par_iter().map(|path| file_size(path)).collect()))
    }
}

/// A deviation of exactly `tolerance * nominal_size` bytes is still accepted.
pub fn is_corrupted(size: u64, nominal_size: u64, tolerance: f64) -> bool {
    size.abs_diff(nominal_size) as f64 > tolerance * nominal_size as f64
}

fn file_size(path: &Utf8Path) -> Option<u64> {
    fs::metadata(path.as_std_path()).ok().map(|meta| meta.len())
}
