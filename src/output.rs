use std::io::{self, Write};

use serde::Serialize;

use crate::app::{FilesResult, IdsResult, VerifyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Plain,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_ids(result: &IdsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_files(result: &FilesResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_verify(result: &VerifyResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct PlainOutput;

impl PlainOutput {
    pub fn print_ids(result: &IdsResult) {
        println!(
            "wrote {} product ids from {} batches to {}",
            result.written, result.batches, result.output
        );
        if let Some(mismatch) = &result.mismatch {
            println!("warning: {mismatch}");
        }
    }

    pub fn print_files(result: &FilesResult) {
        println!(
            "fetched {} files into {} ({} failed)",
            result.fetched, result.output_directory, result.failed
        );
        for outcome in result.outcomes.iter().filter(|outcome| !outcome.is_fetched()) {
            println!("  failed: {}", outcome.item.id);
        }
        if let Some(mismatch) = &result.mismatch {
            println!("warning: {mismatch}");
        }
    }

    pub fn print_verify(result: &VerifyResult) {
        println!(
            "checked {} files in {}",
            result.candidates, result.directory
        );
        match &result.result.missing {
            Some(missing) => {
                println!("missing: {}", missing.len());
                for instant in missing {
                    println!("  {instant}");
                }
            }
            None => println!("missing: not checked"),
        }
        match &result.result.corrupted {
            Some(corrupted) => {
                println!("corrupted: {}", corrupted.len());
                for path in corrupted {
                    println!("  {path}");
                }
            }
            None => println!("corrupted: not checked"),
        }
    }
}
