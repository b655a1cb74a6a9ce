use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::SatfetchError;

/// Collects files under `root` whose name contains `pattern`, sorted by path.
pub fn visit_files(
    root: &Utf8Path,
    pattern: Option<&str>,
    recursive: bool,
) -> Result<Vec<Utf8PathBuf>, SatfetchError> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| SatfetchError::Filesystem(format!("read dir {dir}: {err}")))?;
        for entry in entries.flatten() {
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if path.is_dir() {
                if recursive {
                    stack.push(path);
                }
            } else if path
                .file_name()
                .map(|name| pattern.is_none_or(|pattern| name.contains(pattern)))
                .unwrap_or(false)
            {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Reads one item per line, trimmed, skipping blank lines.
pub fn read_lines(path: &Utf8Path) -> Result<Vec<String>, SatfetchError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| SatfetchError::Filesystem(format!("read {path}: {err}")))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn write_lines<I>(path: &Utf8Path, items: I, append: bool) -> Result<usize, SatfetchError>
where
    I: IntoIterator,
    I::Item: Display,
{
    if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| SatfetchError::Filesystem(err.to_string()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path.as_std_path())
        .map_err(|err| SatfetchError::Filesystem(format!("open {path}: {err}")))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0usize;
    for item in items {
        writeln!(writer, "{item}").map_err(|err| SatfetchError::Filesystem(err.to_string()))?;
        written += 1;
    }
    writer
        .flush()
        .map_err(|err| SatfetchError::Filesystem(err.to_string()))?;
    Ok(written)
}
