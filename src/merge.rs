use chrono::NaiveDate;

use crate::collector::task::dedup_by_link;
use crate::schema::{JobRow, MergedTable, SourceResult};

/// Unions every successful source into one table.
///
/// - `Failed` results are skipped (the pool already logged them)
///   and listed in `failed_sources`
/// - rows without a university tag get their source's name
/// - duplicate links are removed within a source, never across
///   sources
/// - every row shares `scrape_date`
///
/// Rows are appended in the order results arrive, which carries
/// no meaning.
pub fn merge(results: Vec<SourceResult>, scrape_date: NaiveDate) -> MergedTable {
    let mut table = MergedTable::empty(scrape_date);

    for result in results {
        let rows = match result.outcome {
            Ok(rows) => rows,
            Err(_) => {
                table.failed_sources.push(result.source);
                continue;
            }
        };

        let source = result.source;
        table.rows.extend(dedup_by_link(rows).into_iter().map(|r| JobRow {
            title: r.title,
            uni_name: r.uni_name.unwrap_or_else(|| source.clone()),
            link: r.link,
        }));
        table.contributing_sources.push(source);
    }

    table
}
