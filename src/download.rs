use crate::client::{SaveSnafu, SubmitError};
use snafu::prelude::*;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const DOWNLOAD_NAME: &str = "custom_output.csv";

/// `custom_output.csv`, then `custom_output (1).csv`, `custom_output (2).csv`, ...
pub fn candidate_name(attempt: u32) -> String {
    if attempt == 0 {
        return DOWNLOAD_NAME.to_string();
    }
    let (stem, ext) = DOWNLOAD_NAME
        .rsplit_once('.')
        .unwrap_or((DOWNLOAD_NAME, ""));
    format!("{} ({}).{}", stem, attempt, ext)
}

/// Writes the response body without overwriting an earlier download.
///
/// The body is stored as-is; nothing checks that it is CSV.
pub fn save_download(body: &[u8], dir: &Path) -> Result<PathBuf, SubmitError> {
    std::fs::create_dir_all(dir).context(SaveSnafu { path: dir })?;

    let mut attempt = 0;
    loop {
        let path = dir.join(candidate_name(attempt));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                write_or_remove(file, body, &path)?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e).context(SaveSnafu { path }),
        }
    }
}

/// Writes `body` to the freshly created `path`, deleting it again on failure
/// so a half-written file does not take the name.
pub fn write_or_remove<W: Write>(mut out: W, body: &[u8], path: &Path) -> Result<(), SubmitError> {
    let result = out.write_all(body).and_then(|_| out.flush());
    drop(out);
    if let Err(e) = result {
        let _ = std::fs::remove_file(path);
        return Err(e).context(SaveSnafu { path });
    }
    Ok(())
}

/// Shape of a saved CSV, for the success message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSummary {
    pub columns: Vec<String>,
    pub records: usize,
}

pub fn summarize_csv(path: &Path) -> Result<CsvSummary, Box<dyn std::error::Error>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let columns = rdr.headers()?.iter().map(|h| h.to_string()).collect();

    let mut records = 0;
    for result in rdr.records() {
        result?;
        records += 1;
    }

    Ok(CsvSummary { columns, records })
}
