use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::domain::{BatchInterval, BoundingBox, Collection, OutputFormat, Polygon, TimeRange};
use crate::error::SatfetchError;
use crate::fetch::FetchParams;
use crate::integrity::IntegritySettings;

pub const DEFAULT_CONFIG_FILE: &str = "satfetch.json";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub collection: Option<Collection>,
    #[serde(default)]
    pub ids: Option<IdsEntry>,
    #[serde(default)]
    pub files: Option<FilesEntry>,
    #[serde(default)]
    pub verify: Option<VerifyEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IdsEntry {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub batch_interval: Option<String>,
    pub output: Utf8PathBuf,
    #[serde(default)]
    pub polygon: Option<Vec<(f64, f64)>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FilesEntry {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub batch_interval: Option<String>,
    pub output_directory: Utf8PathBuf,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VerifyEntry {
    pub directory: Utf8PathBuf,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub reference: Option<Utf8PathBuf>,
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub nominal_size: Option<u64>,
    #[serde(default)]
    pub tolerance: Option<f64>,
    #[serde(default)]
    pub parallelism: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct IdsRequest {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub window: TimeDelta,
    pub polygon: Option<Polygon>,
    pub output: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct FilesRequest {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub window: TimeDelta,
    pub output_directory: Utf8PathBuf,
    pub params: FetchParams,
}

#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub directory: Utf8PathBuf,
    pub pattern: Option<String>,
    pub reference: Option<Utf8PathBuf>,
    pub period: Option<TimeRange>,
    pub settings: IntegritySettings,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub collection: Collection,
    pub ids: Option<IdsRequest>,
    pub files: Option<FilesRequest>,
    pub verify: Option<VerifyRequest>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SatfetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(SatfetchError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SatfetchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SatfetchError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SatfetchError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let collection = config.collection.unwrap_or_default();

        let ids = config
            .ids
            .map(|entry| {
                check_order(entry.start, entry.end)?;
                Ok::<_, SatfetchError>(IdsRequest {
                    start: entry.start,
                    end: entry.end,
                    window: resolve_interval(entry.batch_interval.as_deref())?,
                    polygon: entry.polygon.map(|vertices| Polygon { vertices }),
                    output: entry.output,
                })
            })
            .transpose()?;

        let files = config
            .files
            .map(|entry| {
                check_order(entry.start, entry.end)?;
                Ok::<_, SatfetchError>(FilesRequest {
                    start: entry.start,
                    end: entry.end,
                    window: resolve_interval(entry.batch_interval.as_deref())?,
                    output_directory: entry.output_directory,
                    params: FetchParams {
                        product_type: collection.product_type().to_string(),
                        bounding_box: entry.bounding_box.unwrap_or_default(),
                        format: entry.format.unwrap_or_default(),
                        poll_interval: Duration::from_secs(
                            entry.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
                        ),
                    },
                })
            })
            .transpose()?;

        let verify = config.verify.map(resolve_verify).transpose()?;

        Ok(ResolvedConfig {
            schema_version,
            collection,
            ids,
            files,
            verify,
        })
    }
}

fn resolve_verify(entry: VerifyEntry) -> Result<VerifyRequest, SatfetchError> {
    let period = match (entry.start, entry.end) {
        (Some(start), Some(end)) => Some(TimeRange::new(start, end)?),
        (None, None) => None,
        _ => {
            return Err(SatfetchError::Configuration(
                "verify period needs both start and end".to_string(),
            ));
        }
    };
    let defaults = IntegritySettings::default();
    let settings = IntegritySettings {
        nominal_size: entry.nominal_size,
        tolerance: entry.tolerance.unwrap_or(defaults.tolerance),
        parallelism: entry.parallelism.unwrap_or(defaults.parallelism),
    };
    Ok(VerifyRequest {
        directory: entry.directory,
        pattern: entry.pattern,
        reference: entry.reference,
        period,
        settings,
    })
}

fn resolve_interval(value: Option<&str>) -> Result<TimeDelta, SatfetchError> {
    let interval = match value {
        Some(value) => value.parse::<BatchInterval>()?,
        None => BatchInterval::default(),
    };
    Ok(interval.as_delta())
}

fn check_order(start: NaiveDateTime, end: NaiveDateTime) -> Result<(), SatfetchError> {
    if start > end {
        return Err(SatfetchError::InvalidRange { start, end });
    }
    Ok(())
}
