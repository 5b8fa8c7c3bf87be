use crate::domain::policy::DialogPolicy;
use crate::error::{Result, UssdError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Session lifetime and sweep cadence, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 180,
            sweep_interval_secs: 60,
        }
    }
}

impl SessionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Everything the service reads at startup. Missing keys take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub session: SessionSettings,
    pub dialog: DialogPolicy,
    /// Marketplace JSON; the bundled demo data is used when unset.
    pub data_path: Option<PathBuf>,
}

/// Command-line values that win over the settings file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub session_timeout_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub conversion_rate: Option<Decimal>,
    pub conversion_min: Option<Decimal>,
    pub conversion_max: Option<Decimal>,
    pub data_path: Option<PathBuf>,
}

impl Settings {
    /// Reads settings from a JSON file, or the defaults when no path is
    /// given, then applies `overrides` and validates the result.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut settings: Self = match path {
            Some(path) => {
                let file = File::open(path)?;
                serde_json::from_reader(BufReader::new(file))?
            }
            None => Self::default(),
        };
        settings.apply(overrides);
        settings.validate()?;
        Ok(settings)
    }

    fn apply(&mut self, overrides: Overrides) {
        if let Some(secs) = overrides.session_timeout_secs {
            self.session.timeout_secs = secs;
        }
        if let Some(secs) = overrides.sweep_interval_secs {
            self.session.sweep_interval_secs = secs;
        }
        let conversion = &mut self.dialog.conversion;
        if let Some(rate) = overrides.conversion_rate {
            conversion.rate = rate;
        }
        if let Some(min) = overrides.conversion_min {
            conversion.min = min;
        }
        if let Some(max) = overrides.conversion_max {
            conversion.max = max;
        }
        if overrides.data_path.is_some() {
            self.data_path = overrides.data_path;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let session = &self.session;
        if session.timeout_secs == 0 {
            return Err(UssdError::ConfigError(
                "session timeout must be positive".to_string(),
            ));
        }
        // An idle session must be gone within one sweep of expiring.
        if session.sweep_interval_secs == 0 || session.sweep_interval_secs >= session.timeout_secs {
            return Err(UssdError::ConfigError(format!(
                "sweep interval must be between 1 and {} seconds, got {}",
                session.timeout_secs - 1,
                session.sweep_interval_secs
            )));
        }
        self.dialog.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::Source;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::load(None, Overrides::default()).unwrap();
        assert_eq!(settings.session.timeout(), Duration::from_secs(180));
        assert_eq!(settings.dialog.conversion.rate, dec!(0.95));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"session": {{"timeout_secs": 300}}, "dialog": {{"payment_sources": ["wallet", "account"]}}}}"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path()), Overrides::default()).unwrap();

        assert_eq!(settings.session.timeout_secs, 300);
        assert_eq!(settings.session.sweep_interval_secs, 60);
        assert_eq!(
            settings.dialog.payment_sources,
            vec![Source::Wallet, Source::Account]
        );
        assert_eq!(settings.dialog.brand, "MzansiMarket");
    }

    #[test]
    fn test_sweep_interval_must_undercut_timeout() {
        let settings = Settings {
            session: SessionSettings {
                timeout_secs: 60,
                sweep_interval_secs: 60,
            },
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(UssdError::ConfigError(_))));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"session": {{"timeout_secs": 300, "sweep_interval_secs": 30}}}}"#).unwrap();
        let overrides = Overrides {
            session_timeout_secs: Some(120),
            conversion_rate: Some(dec!(0.9)),
            conversion_max: Some(dec!(250)),
            ..Overrides::default()
        };

        let settings = Settings::load(Some(file.path()), overrides).unwrap();

        assert_eq!(settings.session.timeout_secs, 120);
        assert_eq!(settings.session.sweep_interval_secs, 30);
        assert_eq!(settings.dialog.conversion.rate, dec!(0.9));
        assert_eq!(settings.dialog.conversion.min, dec!(10));
        assert_eq!(settings.dialog.conversion.max, dec!(250));
    }

    #[test]
    fn test_overrides_are_validated() {
        let overrides = Overrides {
            conversion_rate: Some(dec!(1.5)),
            ..Overrides::default()
        };
        assert!(matches!(
            Settings::load(None, overrides),
            Err(UssdError::ConfigError(_))
        ));
    }
}
