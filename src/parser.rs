use std::sync::LazyLock;

use camino::Utf8Path;
use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};

use crate::error::SatfetchError;

static SEVIRI_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[0-9A-Za-z]+-SEVI-[0-9A-Za-z]+-[0-9]+-NA-([0-9]{4})([0-9]{2})([0-9]{2})([0-9]{2})([0-9]{2})[0-9]{2}\.[0-9]+Z-NA",
    )
    .expect("SEVIRI product id pattern is valid")
});

static FILE_STEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9A-Za-z]+_([0-9]{4})([0-9]{2})([0-9]{2})_([0-9]{2})_([0-9]{2})")
        .expect("file stem pattern is valid")
});

/// Turns an item such as a product id or a file path into the instant it describes.
pub trait DateTimeParser {
    fn parse(item: &str) -> Result<NaiveDateTime, SatfetchError>;
}

/// `MSG3-SEVI-MSG15-0100-NA-20150731221240.036000000Z-NA` → `2015-07-31 22:12`.
pub struct SeviriIdParser;

impl DateTimeParser for SeviriIdParser {
    fn parse(item: &str) -> Result<NaiveDateTime, SatfetchError> {
        parse_by_regex(item, &SEVIRI_ID)
    }
}

/// `<dir>/<prefix>_<YYYYMMDD>_<HH>_<MM>[.ext]` → the encoded instant. The prefix is mandatory.
pub struct FilePathParser;

impl FilePathParser {
    pub fn parse_path(path: &Utf8Path) -> Result<NaiveDateTime, SatfetchError> {
        let stem = path
            .file_stem()
            .ok_or_else(|| SatfetchError::DateTimeParse(path.to_string()))?;
        parse_by_regex(stem, &FILE_STEM).map_err(|_| SatfetchError::DateTimeParse(path.to_string()))
    }
}

impl DateTimeParser for FilePathParser {
    fn parse(item: &str) -> Result<NaiveDateTime, SatfetchError> {
        Self::parse_path(Utf8Path::new(item))
    }
}

fn parse_by_regex(item: &str, regex: &Regex) -> Result<NaiveDateTime, SatfetchError> {
    regex
        .captures(item)
        .and_then(|captures| datetime_from_captures(&captures))
        .ok_or_else(|| SatfetchError::DateTimeParse(item.to_string()))
}

fn datetime_from_captures(captures: &Captures<'_>) -> Option<NaiveDateTime> {
    let field = |index: usize| -> Option<u32> { captures.get(index)?.as_str().parse().ok() };
    let year = i32::try_from(field(1)?).ok()?;
    NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?.and_hms_opt(field(4)?, field(5)?, 0)
}
