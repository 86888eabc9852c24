//! Spending summary over the master dataset.
//!
//! Monthly totals per transaction type and simple amount statistics, used
//! by the CLI's `--summary` report. Flagged records carry a placeholder
//! amount and are left out of every figure; the report only counts them.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use ledger_core::amount::Amount;
use ledger_core::models::{TransactionRecord, TxnType};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

// ── Monthly spending ──────────────────────────────────────────────────────────

/// Spending in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlySpending {
    /// `"%Y-%m"`.
    pub month: String,
    pub by_type: BTreeMap<TxnType, Amount>,
    pub total: Amount,
}

/// Records whose amount was actually read from the message.
fn priced(records: &[TransactionRecord]) -> impl Iterator<Item = &TransactionRecord> {
    records.iter().filter(|r| !r.is_flagged())
}

/// Group `records` by month of `txn_date`, ascending.
pub fn monthly_spending(records: &[TransactionRecord]) -> Vec<MonthlySpending> {
    let mut months: BTreeMap<String, BTreeMap<TxnType, Amount>> = BTreeMap::new();

    for record in priced(records) {
        let key = record.txn_date.format("%Y-%m").to_string();
        let slot = months
            .entry(key)
            .or_default()
            .entry(record.txn_type)
            .or_insert(Amount::ZERO);
        *slot = *slot + record.txn_amount;
    }

    months
        .into_iter()
        .map(|(month, by_type)| MonthlySpending {
            total: by_type.values().sum(),
            month,
            by_type,
        })
        .collect()
}

// ── SpendingStats ─────────────────────────────────────────────────────────────

/// Count, total, mean, median and population standard deviation of amounts.
#[derive(Debug, Clone, PartialEq)]
pub struct SpendingStats {
    pub count: usize,
    pub total: Amount,
    pub mean: Decimal,
    pub median: Decimal,
    pub std_dev: Decimal,
}

impl SpendingStats {
    /// `None` when no record has a real amount.
    pub fn compute(records: &[TransactionRecord]) -> Option<Self> {
        let mut values: Vec<Decimal> = priced(records).map(|r| r.txn_amount.as_decimal()).collect();
        if values.is_empty() {
            return None;
        }
        values.sort();

        let count = values.len();
        let n = Decimal::from(count);
        let sum: Decimal = values.iter().sum();
        let mean = sum / n;

        let mid = count / 2;
        let median = if count % 2 == 0 {
            (values[mid - 1] + values[mid]) / Decimal::TWO
        } else {
            values[mid]
        };

        let variance: Decimal = values
            .iter()
            .map(|v| (*v - mean) * (*v - mean))
            .sum::<Decimal>()
            / n;
        let std_dev = variance
            .to_f64()
            .map(f64::sqrt)
            .and_then(Decimal::from_f64)
            .unwrap_or(Decimal::ZERO);

        Some(Self {
            count,
            total: Amount::from_decimal(sum),
            mean,
            median,
            std_dev,
        })
    }

    /// Amounts strictly above this are "large".
    pub fn large_threshold(&self) -> Decimal {
        self.mean + self.std_dev
    }
}

/// Records whose amount exceeds mean + one standard deviation.
pub fn large_transactions<'a>(
    records: &'a [TransactionRecord],
    stats: &SpendingStats,
) -> Vec<&'a TransactionRecord> {
    let threshold = stats.large_threshold();
    priced(records)
        .filter(|r| r.txn_amount.as_decimal() > threshold)
        .collect()
}

/// Plain-text report of [`monthly_spending`] and [`SpendingStats`].
pub fn render_summary(records: &[TransactionRecord]) -> String {
    let mut out = String::new();
    let flagged = records.iter().filter(|r| r.is_flagged()).count();
    let Some(stats) = SpendingStats::compute(records) else {
        out.push_str("No transactions.\n");
        if flagged > 0 {
            let _ = writeln!(out, "Flagged without amount: {flagged}");
        }
        return out;
    };

    let _ = writeln!(out, "Monthly spending");
    for month in monthly_spending(records) {
        let parts: Vec<String> = month
            .by_type
            .iter()
            .map(|(txn_type, amount)| format!("{txn_type} ${amount}"))
            .collect();
        let _ = writeln!(out, "  {}  ${}  ({})", month.month, month.total, parts.join(", "));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Total number of transactions: {}", stats.count);
    let _ = writeln!(out, "Total amount spent: ${}", stats.total);
    let _ = writeln!(out, "Average per transaction: ${}", Amount::from_decimal(stats.mean));
    let _ = writeln!(out, "Median per transaction: ${}", Amount::from_decimal(stats.median));
    let _ = writeln!(out, "Standard deviation: {}", Amount::from_decimal(stats.std_dev));

    for record in large_transactions(records, &stats) {
        let _ = writeln!(
            out,
            "Large transaction: ${} to {} on {}",
            record.txn_amount, record.txn_to, record.txn_date
        );
    }
    if flagged > 0 {
        let _ = writeln!(out, "Flagged without amount: {flagged}");
    }
    out
}
