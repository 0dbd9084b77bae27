use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use log::{info, warn};
use serde::Deserialize;
use calamine::{open_workbook_auto, Reader};

use crate::error::{MatcherError, Result};
use crate::models::Identity;

const EMAIL_COLUMN: &str = "Email";
const NAME_COLUMN: &str = "Name";

#[derive(Debug, Deserialize)]
struct InputRow {
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Name", default)]
    name: Option<String>,
}

/// Reads identities from a CSV (or xlsx/xls) file. Rows with a blank email are
/// skipped with a warning; an email seen earlier in the file is skipped too.
pub fn load_identities<P: AsRef<Path>>(filename: P) -> Result<Vec<Identity>> {
    let path_ref = filename.as_ref();

    if !path_ref.exists() {
        return Err(MatcherError::InputNotFound(path_ref.to_path_buf()));
    }

    let is_excel = path_ref
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xls"));

    let identities = if is_excel {
        load_excel(path_ref)?
    } else {
        load_csv(path_ref)?
    };

    info!("Successfully read {} records from {:?}", identities.len(), path_ref);
    Ok(identities)
}

fn load_csv(path: &Path) -> Result<Vec<Identity>> {
    let file = File::open(path)
        .map_err(|e| MatcherError::InvalidFormat(format!("could not open {:?}: {}", path, e)))?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = rdr
        .headers()
        .map_err(|e| MatcherError::InvalidFormat(format!("could not read header row: {}", e)))?;
    if !headers.iter().any(|h| h == EMAIL_COLUMN) {
        return Err(MatcherError::InvalidFormat(
            "Input CSV must contain an 'Email' column".to_string(),
        ));
    }

    let mut collector = Collector::default();
    // Header is row 1.
    for (i, result) in rdr.deserialize::<InputRow>().enumerate() {
        let row_num = i + 2;
        match result {
            Ok(row) => collector.push(row_num, &row.email, row.name.as_deref().unwrap_or("")),
            Err(e) => warn!("Could not parse row {}: {}, skipping", row_num, e),
        }
    }
    Ok(collector.identities)
}

fn load_excel(path: &Path) -> Result<Vec<Identity>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| MatcherError::InvalidFormat(format!("could not open workbook: {}", e)))?;

    let range = match workbook.worksheets().into_iter().next() {
        Some((_name, range)) => range,
        None => return Err(MatcherError::InvalidFormat("workbook has no sheets".to_string())),
    };

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| MatcherError::InvalidFormat("workbook sheet is empty".to_string()))?;

    let column = |wanted: &str| {
        header
            .iter()
            .position(|cell| cell.to_string().trim().eq_ignore_ascii_case(wanted))
    };
    let email_idx = column(EMAIL_COLUMN).ok_or_else(|| {
        MatcherError::InvalidFormat("Input workbook must contain an 'Email' column".to_string())
    })?;
    let name_idx = column(NAME_COLUMN);

    let mut collector = Collector::default();
    for (i, row) in rows.enumerate() {
        let email = row.get(email_idx).map(|c| c.to_string()).unwrap_or_default();
        let name = name_idx.and_then(|idx| row.get(idx)).map(|c| c.to_string()).unwrap_or_default();
        collector.push(i + 2, &email, &name);
    }
    Ok(collector.identities)
}

#[derive(Default)]
struct Collector {
    identities: Vec<Identity>,
    seen: HashSet<String>,
}

impl Collector {
    fn push(&mut self, row_num: usize, email: &str, name: &str) {
        let identity = Identity::new(email, name);
        if identity.email.is_empty() {
            warn!("Empty email found in row {}, skipping", row_num);
            return;
        }
        if !self.seen.insert(identity.email.clone()) {
            warn!("Duplicate email {} in row {}, skipping", identity.email, row_num);
            return;
        }
        self.identities.push(identity);
    }
}
