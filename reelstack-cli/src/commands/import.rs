///! Bulk CSV import into the document collection

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use reelstack_common::Error;

use crate::client::ControlPlaneClient;
use crate::commands::Targets;
use crate::output;

/// Columns every importable record must carry a value for. `Rank` is the
/// document key and `Title`/`Year` identify the entry to the frontend.
const REQUIRED_FIELDS: [&str; 3] = ["Rank", "Title", "Year"];

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub total: u64,
    pub imported: u64,
    pub skipped: u64,
}

pub async fn handle_import_command(
    group: &str,
    csv_path: &Path,
    api: &ControlPlaneClient,
) -> Result<ImportSummary> {
    let targets = Targets::for_group(group);

    output::print_info(&format!(
        "Importing {} into collection '{}'...",
        csv_path.display(),
        targets.collection
    ));

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("cannot open CSV file {}", csv_path.display()))?;

    let database = targets.database.clone();
    let collection = targets.collection.clone();
    let summary = import_records(file, |doc| {
        let database = database.clone();
        let collection = collection.clone();
        async move {
            api.insert_document(group, &database, &collection, &doc)
                .await
                .map(|_| ())
                .map_err(Error::from)
        }
    })
    .await?;

    if summary.skipped > 0 {
        output::print_warning(&format!(
            "{} of {} records skipped",
            summary.skipped, summary.total
        ));
    }
    output::print_success(&format!(
        "Imported {} of {} records into '{}'",
        summary.imported, summary.total, targets.collection
    ));

    Ok(summary)
}

/// One write-or-skip pass over the CSV data: malformed records and failed
/// writes are logged and skipped, and never abort the batch.
pub async fn import_records<R, F, Fut>(reader: R, mut sink: F) -> Result<ImportSummary>
where
    R: std::io::Read,
    F: FnMut(serde_json::Value) -> Fut,
    Fut: Future<Output = reelstack_common::Result<()>>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();

    let mut total = 0u64;
    let mut skipped = 0u64;

    for (index, row) in csv_reader.records().enumerate() {
        // Header occupies line 1.
        let line = index as u64 + 2;
        total += 1;

        let record = match row {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("skipping unparseable record at line {}: {}", line, e);
                skipped += 1;
                continue;
            }
        };

        let document = match row_to_document(&headers, &record, line) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("{}", e);
                skipped += 1;
                continue;
            }
        };

        if let Err(e) = sink(document).await {
            tracing::warn!("skipping record at line {}: write failed: {}", line, e);
            skipped += 1;
        }
    }

    Ok(ImportSummary {
        total,
        imported: total - skipped,
        skipped,
    })
}

/// Build one JSON document from a CSV row, keyed by header names.
///
/// Numeric-looking values become JSON numbers; everything else stays a
/// string. A missing or empty required field makes the record malformed.
fn row_to_document(
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
    line: u64,
) -> reelstack_common::Result<serde_json::Value> {
    let mut document = serde_json::Map::new();

    for (header, value) in headers.iter().zip(record.iter()) {
        document.insert(header.to_string(), coerce_value(value));
    }

    for field in REQUIRED_FIELDS {
        let present = document
            .get(field)
            .map(|v| match v {
                serde_json::Value::String(s) => !s.is_empty(),
                serde_json::Value::Null => false,
                _ => true,
            })
            .unwrap_or(false);

        if !present {
            return Err(Error::MalformedRecord {
                line,
                reason: format!("missing required field '{}'", field),
            });
        }
    }

    Ok(serde_json::Value::Object(document))
}

fn coerce_value(raw: &str) -> serde_json::Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return serde_json::Value::from(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return serde_json::Value::from(f);
    }
    serde_json::Value::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    const CATALOG: &str = "\
Rank,Title,Year,Genre,Rating
1,Arrival Song,2016,Drama,8.0
2,Silent Harbor,,Thriller,7.1
3,Glass Orchard,2019,Drama,7.8
";

    fn counting_sink() -> (
        impl FnMut(serde_json::Value) -> std::future::Ready<reelstack_common::Result<()>>,
        Arc<AtomicU64>,
    ) {
        let written = Arc::new(AtomicU64::new(0));
        let counter = written.clone();
        let sink = move |_doc: serde_json::Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        };
        (sink, written)
    }

    #[tokio::test]
    async fn skips_record_missing_required_year() {
        let (sink, written) = counting_sink();
        let summary = import_records(CATALOG.as_bytes(), sink).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.imported, 2);
        assert_eq!(written.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn write_failures_skip_and_continue() {
        let written = Arc::new(AtomicU64::new(0));
        let counter = written.clone();

        let summary = import_records(CATALOG.as_bytes(), move |doc| {
            let failed = doc["Rank"] == serde_json::json!(1);
            if !failed {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            std::future::ready(if failed {
                Err(Error::Transient("write rejected".to_string()))
            } else {
                Ok(())
            })
        })
        .await
        .unwrap();

        // Line 2 rejected by the sink, line 3 malformed, line 4 written.
        assert_eq!(summary.total, 3);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.imported, 1);
        assert_eq!(written.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_file_imports_nothing() {
        let (sink, _) = counting_sink();
        let summary = import_records("Rank,Title,Year\n".as_bytes(), sink)
            .await
            .unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(summary.imported, 0);
    }

    #[test]
    fn documents_carry_typed_values() {
        let headers = csv::StringRecord::from(vec!["Rank", "Title", "Year", "Rating"]);
        let record = csv::StringRecord::from(vec!["7", "Night Ferry", "2012", "6.9"]);

        let doc = row_to_document(&headers, &record, 2).unwrap();
        assert_eq!(doc["Rank"], serde_json::json!(7));
        assert_eq!(doc["Title"], serde_json::json!("Night Ferry"));
        assert_eq!(doc["Year"], serde_json::json!(2012));
        assert_eq!(doc["Rating"], serde_json::json!(6.9));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let headers = csv::StringRecord::from(vec!["Rank", "Title", "Year"]);
        let record = csv::StringRecord::from(vec!["7", "", "2012"]);

        let err = row_to_document(&headers, &record, 5).unwrap_err();
        match err {
            Error::MalformedRecord { line, reason } => {
                assert_eq!(line, 5);
                assert!(reason.contains("Title"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
