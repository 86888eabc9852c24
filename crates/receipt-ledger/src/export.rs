use std::path::{Path, PathBuf};

use ledger_core::models::TransactionRecord;

/// Column order of the exported dataset.
pub const COLUMNS: [&str; 7] = [
    "txn_type",
    "txn_id",
    "txn_date",
    "txn_time",
    "txn_amount",
    "txn_from",
    "txn_to",
];

pub fn csv_path(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("master_{name}.csv"))
}

pub fn json_path(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("master_{name}.json"))
}

/// Write `master_<name>.csv`. The header row is written even when there are
/// no records; absent values are empty cells.
pub fn write_csv(
    records: &[TransactionRecord],
    output_dir: &Path,
    name: &str,
) -> anyhow::Result<PathBuf> {
    let path = csv_path(output_dir, name);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)?;

    writer.write_record(COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    tracing::info!("wrote {} records to {}", records.len(), path.display());
    Ok(path)
}

/// Write `master_<name>.json` as a pretty-printed array; absent values are
/// `null`.
pub fn write_json(
    records: &[TransactionRecord],
    output_dir: &Path,
    name: &str,
) -> anyhow::Result<PathBuf> {
    let path = json_path(output_dir, name);
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(&path, json)?;

    tracing::info!("wrote {} records to {}", records.len(), path.display());
    Ok(path)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
