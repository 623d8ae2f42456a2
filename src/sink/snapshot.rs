use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use chrono::NaiveDate;
use log::{debug, info};

use crate::error::SnapshotError;
use crate::schema::{JobRow, MergedTable};
use crate::util::SCRAPE_DATE_FORMAT;

/// Spreadsheet tools need the BOM to detect UTF-8.
const BOM: &str = "\u{feff}";

pub const HEADER: [&str; 4] = ["Job Title", "UniName", "Link", "Scrape_Date"];

/// Writes the table as the new snapshot at `path`.
///
/// Order of operations:
/// 1. create the parent directory
/// 2. delete the previous snapshot and every `stale` artifact
/// 3. write header + rows
///
/// A run therefore never leaves a file mixing two runs, even if
/// the previous write was interrupted.
pub fn write_snapshot(
    table: &MergedTable,
    path: &Path,
    stale: &[impl AsRef<Path>],
) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    remove_if_present(path)?;
    for old in stale {
        remove_if_present(old.as_ref())?;
    }

    let mut file = File::create(path).map_err(|e| io_error(path, e))?;
    file.write_all(BOM.as_bytes()).map_err(|e| io_error(path, e))?;

    let date = table.scrape_date.format(SCRAPE_DATE_FORMAT).to_string();
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(HEADER)?;
    for row in &table.rows {
        writer.write_record([
            row.title.as_str(),
            row.uni_name.as_str(),
            row.link.as_str(),
            date.as_str(),
        ])?;
    }
    writer.flush().map_err(|e| io_error(path, e))?;

    info!("snapshot written to {} ({} rows)", path.display(), table.len());
    Ok(())
}

/// Loads a snapshot back into a table.
///
/// Tolerates files written by older tooling:
/// - no `Scrape_Date` column: `fallback_date` is used
/// - no `UniName` column: the file stem stands in (e.g. `uq_job_listings.csv` → `UQ`)
pub fn read_snapshot(path: &Path, fallback_date: NaiveDate) -> Result<MergedTable, SnapshotError> {
    let data = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let data = data.strip_prefix(BOM).unwrap_or(&data);

    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);

    let malformed = |reason: &str| SnapshotError::Malformed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let title_idx = column("Job Title").ok_or_else(|| malformed("missing 'Job Title' column"))?;
    let link_idx = column("Link").ok_or_else(|| malformed("missing 'Link' column"))?;
    let uni_idx = column("UniName");
    let date_idx = column("Scrape_Date");

    let stem_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split('_').next())
        .unwrap_or_default()
        .to_uppercase();

    let mut scrape_date = None;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let get = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(str::trim);

        let title = get(Some(title_idx)).unwrap_or_default();
        let link = get(Some(link_idx)).unwrap_or_default();
        if title.is_empty() || link.is_empty() {
            debug!("{}: skipping incomplete row {:?}", path.display(), record);
            continue;
        }

        if scrape_date.is_none() {
            scrape_date = get(date_idx)
                .and_then(|d| NaiveDate::parse_from_str(d, SCRAPE_DATE_FORMAT).ok());
        }

        let uni_name = get(uni_idx)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| stem_name.clone());

        rows.push(JobRow {
            title: title.to_string(),
            uni_name,
            link: link.to_string(),
        });
    }

    let sources: BTreeSet<String> = rows.iter().map(|r| r.uni_name.clone()).collect();

    Ok(MergedTable {
        scrape_date: scrape_date.unwrap_or(fallback_date),
        rows,
        contributing_sources: sources.into_iter().collect(),
        failed_sources: Vec::new(),
    })
}

fn remove_if_present(path: &Path) -> Result<(), SnapshotError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("removed previous file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}

fn io_error(path: &Path, source: io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.display().to_string(),
        source,
    }
}
