mod bootstrap;
mod export;

use anyhow::Result;
use ledger_core::settings::Settings;
use ledger_data::aggregator::Aggregator;
use ledger_data::extract::ExtractorConfig;
use ledger_data::pipeline::Pipeline;
use ledger_data::reader::load_messages;
use ledger_data::summary::render_summary;
use ledger_runtime::batch::BatchProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories(&settings.output_dir)?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("receipt-ledger v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Input: {}, Provider: {}, Timezone: {}, Workers: {}",
        settings.input_dir.display(),
        settings.provider,
        settings.timezone,
        settings.workers
    );

    let messages = load_messages(&settings.input_dir);
    if messages.is_empty() {
        tracing::warn!("no messages found under {}", settings.input_dir.display());
    }

    let config = ExtractorConfig {
        self_account_markers: settings.self_account_markers.clone(),
    };
    let pipeline = Pipeline::new(settings.tz(), settings.provider_filter(), &config);
    let processor = BatchProcessor::new(pipeline, settings.workers as usize);

    let dataset = processor.run(messages).await;
    let report = dataset.report;

    let records = if settings.dedupe {
        Aggregator::dedupe_by_identity(dataset.records)
    } else {
        dataset.records
    };

    if settings.wants_csv() {
        export::write_csv(&records, &settings.output_dir, &settings.name)?;
    }
    if settings.wants_json() {
        export::write_json(&records, &settings.output_dir, &settings.name)?;
    }

    if settings.summary {
        print!("{}", render_summary(&records));
    }

    let report = report.recounted(&records);
    tracing::info!(
        "Done: {} records ({} skipped, {} rejected, {} failed, {} flagged)",
        report.emitted,
        report.skipped,
        report.rejected,
        report.failed,
        report.flagged
    );

    Ok(())
}
