use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use log::{info, warn};
use serde_json::{Map, Value};

use crate::error::{MatcherError, Result};
use crate::models::{OutputRecord, OUTPUT_COLUMNS};

/// Creates the output CSV with its header row if it does not exist yet, and
/// repairs what a crash mid-write can leave behind: an empty file, a file
/// whose header never made it to disk, or a last row without its newline.
pub fn ensure_initialized<P: AsRef<Path>>(output_file: P) -> Result<()> {
    let path = output_file.as_ref();
    if !path.exists() {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| MatcherError::WriteFailed(format!("could not create {:?}: {}", path, e)))?;
        write_header(&file, path)?;
        info!("Created new output file: {:?}", path);
        return Ok(());
    }

    let contents = fs::read(path)
        .map_err(|e| MatcherError::WriteFailed(format!("could not read {:?}: {}", path, e)))?;
    if contents.is_empty() {
        warn!("Output file {:?} is empty; writing header.", path);
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| MatcherError::WriteFailed(format!("could not open {:?}: {}", path, e)))?;
        return write_header(&file, path);
    }

    if !has_email_header(&contents) {
        warn!("Output file {:?} has no header row; restoring it.", path);
        return restore_header(path, &contents);
    }

    if !contents.ends_with(b"\n") {
        warn!("Output file {:?} ends in a partial row; terminating it.", path);
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| MatcherError::WriteFailed(format!("could not open {:?}: {}", path, e)))?;
        file.write_all(b"\n")
            .map_err(|e| MatcherError::WriteFailed(format!("could not write to {:?}: {}", path, e)))?;
        sync(&file, path)?;
    }
    Ok(())
}

fn write_header(file: &File, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(OUTPUT_COLUMNS)
        .and_then(|_| writer.flush().map_err(csv::Error::from))
        .map_err(|e| MatcherError::WriteFailed(format!("could not write header to {:?}: {}", path, e)))?;
    drop(writer);
    sync(file, path)
}

fn has_email_header(contents: &[u8]) -> bool {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(contents);
    match rdr.byte_records().next() {
        Some(Ok(first)) => first.iter().any(|field| String::from_utf8_lossy(field).trim() == "Email"),
        _ => false,
    }
}

/// Rewrites the file as header + existing rows, swapped in with a rename so
/// the rows already written are never at risk.
fn restore_header(path: &Path, contents: &[u8]) -> Result<()> {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    let staged = PathBuf::from(staged);

    let mut file = File::create(&staged)
        .map_err(|e| MatcherError::WriteFailed(format!("could not create {:?}: {}", staged, e)))?;
    write_header(&file, &staged)?;
    let tail: &[u8] = if contents.ends_with(b"\n") { b"" } else { b"\n" };
    file.write_all(contents)
        .and_then(|_| file.write_all(tail))
        .map_err(|e| MatcherError::WriteFailed(format!("could not write to {:?}: {}", staged, e)))?;
    sync(&file, &staged)?;
    drop(file);

    fs::rename(&staged, path)
        .map_err(|e| MatcherError::WriteFailed(format!("could not replace {:?}: {}", path, e)))
}

/// Appends one record and fsyncs before returning, so a crash after this call
/// cannot lose the row.
pub fn append<P: AsRef<Path>>(output_file: P, record: &OutputRecord) -> Result<()> {
    let path = output_file.as_ref();
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| MatcherError::WriteFailed(format!("could not open {:?}: {}", path, e)))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(&file);
    writer
        .serialize(record)
        .and_then(|_| writer.flush().map_err(csv::Error::from))
        .map_err(|e| MatcherError::WriteFailed(format!("could not append {} to {:?}: {}", record.email, path, e)))?;
    drop(writer);
    sync(&file, path)
}

fn sync(file: &File, path: &Path) -> Result<()> {
    file.sync_all()
        .map_err(|e| MatcherError::WriteFailed(format!("could not sync {:?}: {}", path, e)))
}

/// Every row of the output file as a JSON object keyed by the file's own
/// header, values kept verbatim.
pub fn read_rows<P: AsRef<Path>>(output_file: P) -> std::result::Result<Vec<Map<String, Value>>, csv::Error> {
    let file = File::open(output_file.as_ref())?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(file);
    let headers = rdr.headers()?.clone();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceLevel, EnrichmentResult, Identity, MatchStatus};
    use crate::resume_manager;

    fn record(email: &str, status: MatchStatus) -> OutputRecord {
        OutputRecord::new(&Identity::new(email, "Some One"), EnrichmentResult::with_status(status))
    }

    #[test]
    fn header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        ensure_initialized(&path).unwrap();
        append(&path, &record("a@x.com", MatchStatus::Pending)).unwrap();
        ensure_initialized(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Email,Name,LinkedIn_URL,LinkedIn_Name,Job_Title,Company,Confidence_Level,Status\n\
             a@x.com,Some One,,,,,,Pending\n"
        );
    }

    #[test]
    fn appended_rows_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        ensure_initialized(&path).unwrap();

        let mut found = record("a@x.com", MatchStatus::Found);
        found.profile_url = "https://www.linkedin.com/in/some-one".to_string();
        found.company = "Acme, Inc".to_string();
        found.confidence = Some(ConfidenceLevel::Medium);
        append(&path, &found).unwrap();
        append(&path, &record("b@x.com", MatchStatus::Error("timed out".into()))).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Company"], "Acme, Inc");
        assert_eq!(rows[0]["Confidence_Level"], "MEDIUM");
        assert_eq!(rows[1]["Email"], "b@x.com");
        assert_eq!(rows[1]["Status"], "Error: timed out");
        assert_eq!(rows[1]["Confidence_Level"], "");
    }

    #[test]
    fn append_without_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = append(dir.path().join("missing/out.csv"), &record("a@x.com", MatchStatus::Pending))
            .unwrap_err();
        assert!(matches!(err, MatcherError::WriteFailed(_)));
    }

    #[test]
    fn initializing_inside_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_initialized(dir.path().join("missing/out.csv")).unwrap_err();
        assert!(matches!(err, MatcherError::WriteFailed(_)));
    }

    #[test]
    fn empty_file_gets_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "").unwrap();

        ensure_initialized(&path).unwrap();
        append(&path, &record("a@x.com", MatchStatus::Found)).unwrap();
        ensure_initialized(&path).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Email"], "a@x.com");
        assert!(resume_manager::load_processed_keys(&path).contains("a@x.com"));
    }

    #[test]
    fn rows_without_header_are_kept_under_a_restored_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "a@x.com,A,,,,,,Found\n").unwrap();

        ensure_initialized(&path).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Email"], "a@x.com");
        assert_eq!(rows[0]["Status"], "Found");
        assert!(!dir.path().join("out.csv.tmp").exists());
    }

    #[test]
    fn partial_last_row_is_terminated_before_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        ensure_initialized(&path).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"a@x.com,A,,,").unwrap();
        drop(file);

        ensure_initialized(&path).unwrap();
        append(&path, &record("c@x.com", MatchStatus::Found)).unwrap();

        let keys = resume_manager::load_processed_keys(&path);
        assert!(keys.contains("a@x.com"));
        assert!(keys.contains("c@x.com"));
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows[1]["Email"], "c@x.com");
        assert_eq!(rows[1]["Status"], "Found");
    }
}
