use chrono_tz::Tz;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::Provider;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Build a transaction ledger from exported provider receipt emails
#[derive(Parser, Debug, Clone)]
#[command(
    name = "receipt-ledger",
    about = "Build a transaction ledger from exported provider receipt emails",
    version
)]
pub struct Settings {
    /// Directory holding exported messages (searched recursively for *.json)
    #[arg(long, default_value = "output")]
    pub input_dir: PathBuf,

    /// Directory the master dataset is written to
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Only process messages from this provider
    #[arg(long, default_value = "all", value_parser = ["all", "paylah", "fave", "grab"])]
    pub provider: String,

    /// Timezone used to turn delivery instants into dates (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Substring marking the user's own account; repeat for several accounts
    #[arg(long = "self-account-marker", default_value = "0920")]
    pub self_account_markers: Vec<String>,

    /// Number of messages extracted concurrently (1-64)
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..=64))]
    pub workers: u32,

    /// Drop records sharing a transaction type and id
    #[arg(long)]
    pub dedupe: bool,

    /// Print a monthly spending summary after export
    #[arg(long)]
    pub summary: bool,

    /// Export format
    #[arg(long, default_value = "both", value_parser = ["csv", "json", "both"])]
    pub format: String,

    /// File stem of the exported master dataset
    #[arg(long, default_value = "transactions")]
    pub name: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.receipt-ledger/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_account_markers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<u32>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    /// Uses `~/.receipt-ledger/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".receipt-ledger").join("last_used.json")
    }

    /// Load persisted params from the default path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load persisted params from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        // Build raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins; clap stores arg ids under the field name.
        if !is_arg_explicitly_set(&matches, "input_dir") {
            if let Some(v) = last.input_dir {
                settings.input_dir = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "output_dir") {
            if let Some(v) = last.output_dir {
                settings.output_dir = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "self_account_markers") {
            if let Some(v) = last.self_account_markers.filter(|m| !m.is_empty()) {
                settings.self_account_markers = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "workers") {
            if let Some(v) = last.workers.filter(|w| (1..=64).contains(w)) {
                settings.workers = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }

    /// The provider filter, or `None` for `all`.
    pub fn provider_filter(&self) -> Option<Provider> {
        Provider::from_key(&self.provider)
    }

    /// The configured timezone, falling back to UTC when unrecognised.
    pub fn tz(&self) -> Tz {
        crate::time_utils::resolve_timezone(&self.timezone)
    }

    pub fn wants_csv(&self) -> bool {
        matches!(self.format.as_str(), "csv" | "both")
    }

    pub fn wants_json(&self) -> bool {
        matches!(self.format.as_str(), "json" | "both")
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            input_dir: Some(s.input_dir.clone()),
            output_dir: Some(s.output_dir.clone()),
            timezone: Some(s.timezone.clone()),
            self_account_markers: Some(s.self_account_markers.clone()),
            workers: Some(s.workers),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    // ── LastUsedParams ────────────────────────────────────────────────────────

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            input_dir: Some(PathBuf::from("/data/mail")),
            output_dir: Some(PathBuf::from("/data/ledger")),
            timezone: Some("Asia/Singapore".to_string()),
            self_account_markers: Some(vec!["0920".to_string(), "4411".to_string()]),
            workers: Some(8),
        };
        params.save_to(&path).expect("save");

        let loaded = LastUsedParams::load_from(&path);
        assert_eq!(loaded.input_dir, Some(PathBuf::from("/data/mail")));
        assert_eq!(loaded.output_dir, Some(PathBuf::from("/data/ledger")));
        assert_eq!(loaded.timezone, Some("Asia/Singapore".to_string()));
        assert_eq!(
            loaded.self_account_markers,
            Some(vec!["0920".to_string(), "4411".to_string()])
        );
        assert_eq!(loaded.workers, Some(8));
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists(), "file must exist after save");

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists(), "file must be gone after clear");
    }

    #[test]
    fn test_last_used_params_default_when_missing_or_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        assert!(LastUsedParams::load_from(&path).timezone.is_none());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(LastUsedParams::load_from(&path).workers.is_none());
    }

    // ── CLI parsing ───────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["receipt-ledger"]);

        assert_eq!(settings.input_dir, PathBuf::from("output"));
        assert_eq!(settings.output_dir, PathBuf::from("output"));
        assert_eq!(settings.provider, "all");
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.self_account_markers, vec!["0920".to_string()]);
        assert_eq!(settings.workers, 4);
        assert!(!settings.dedupe);
        assert!(!settings.summary);
        assert_eq!(settings.format, "both");
        assert_eq!(settings.name, "transactions");
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
        assert!(!settings.clear);
        assert_eq!(settings.provider_filter(), None);
    }

    #[test]
    fn test_settings_repeated_markers() {
        let settings = Settings::parse_from([
            "receipt-ledger",
            "--self-account-marker",
            "0920",
            "--self-account-marker",
            "Mobile ending 1234",
        ]);
        assert_eq!(
            settings.self_account_markers,
            vec!["0920".to_string(), "Mobile ending 1234".to_string()]
        );
    }

    #[test]
    fn test_settings_provider_filter() {
        let settings = Settings::parse_from(["receipt-ledger", "--provider", "paylah"]);
        assert_eq!(settings.provider_filter(), Some(Provider::PayLah));
    }

    #[test]
    fn test_settings_workers_out_of_range_rejected() {
        let result = Settings::try_parse_from(["receipt-ledger", "--workers", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_format_flags() {
        let csv_only = Settings::parse_from(["receipt-ledger", "--format", "csv"]);
        assert!(csv_only.wants_csv());
        assert!(!csv_only.wants_json());
        let both = Settings::parse_from(["receipt-ledger"]);
        assert!(both.wants_csv() && both.wants_json());
    }

    #[test]
    fn test_settings_tz_resolution() {
        let settings = Settings::parse_from(["receipt-ledger", "--timezone", "Asia/Singapore"]);
        assert_eq!(settings.tz(), Tz::Asia__Singapore);
    }

    // ── load_with_last_used ───────────────────────────────────────────────────

    #[test]
    fn test_load_with_last_used_merges_persisted_values() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            input_dir: Some(PathBuf::from("/exports")),
            timezone: Some("UTC".to_string()),
            workers: Some(2),
            ..Default::default()
        };
        params.save_to(&config_path).expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["receipt-ledger".into()], &config_path);
        assert_eq!(settings.input_dir, PathBuf::from("/exports"));
        assert_eq!(settings.timezone, "UTC");
        assert_eq!(settings.workers, 2);
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            timezone: Some("UTC".to_string()),
            self_account_markers: Some(vec!["1111".to_string()]),
            ..Default::default()
        };
        params.save_to(&config_path).expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec![
                "receipt-ledger".into(),
                "--timezone".into(),
                "Asia/Singapore".into(),
                "--self-account-marker".into(),
                "2222".into(),
            ],
            &config_path,
        );
        assert_eq!(settings.timezone, "Asia/Singapore");
        assert_eq!(settings.self_account_markers, vec!["2222".to_string()]);
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default()
            .save_to(&config_path)
            .expect("save");

        Settings::load_with_last_used_impl(
            vec!["receipt-ledger".into(), "--clear".into()],
            &config_path,
        );

        assert!(!config_path.exists(), "file must be gone after --clear");
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        let settings = Settings::load_with_last_used_impl(
            vec!["receipt-ledger".into(), "--debug".into()],
            &config_path,
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec![
                "receipt-ledger".into(),
                "--output-dir".into(),
                "/tmp/ledger-out".into(),
                "--timezone".into(),
                "UTC".into(),
            ],
            &config_path,
        );

        assert!(config_path.exists(), "config file must be persisted after run");
        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.output_dir, Some(PathBuf::from("/tmp/ledger-out")));
        assert_eq!(loaded.timezone, Some("UTC".to_string()));
    }
}
