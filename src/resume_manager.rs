use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use log::{info, error};

/// Emails already present in the output file. This is the resume checkpoint:
/// a missing file means a first run, and any read failure degrades to an empty
/// set so the run reprocesses instead of crashing.
pub fn load_processed_keys<P: AsRef<Path>>(output_file: P) -> HashSet<String> {
    let path = output_file.as_ref();
    if !path.exists() {
        info!("No output file found at {:?}. Starting fresh.", path);
        return HashSet::new();
    }

    match read_keys(path) {
        Ok(keys) => {
            info!("Found {} already processed emails", keys.len());
            keys
        }
        Err(e) => {
            error!("Error reading output CSV for resume capability: {}. Starting fresh.", e);
            HashSet::new()
        }
    }
}

fn read_keys(path: &Path) -> Result<HashSet<String>, csv::Error> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(file);

    let email_idx = match rdr.headers()?.iter().position(|h| h.trim() == "Email") {
        Some(idx) => idx,
        None => {
            error!("Output file {:?} has no 'Email' column; nothing to resume from.", path);
            return Ok(HashSet::new());
        }
    };

    let mut keys = HashSet::new();
    for record in rdr.records() {
        let record = record?;
        if let Some(email) = record.get(email_idx).map(str::trim) {
            if !email.is_empty() {
                keys.insert(email.to_string());
            }
        }
    }
    Ok(keys)
}
