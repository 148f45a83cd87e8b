use crate::data::{BarFilter, Interval};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//exchange construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    //opaque tag, only compared against symbol-tagged bars
    pub symbol: String,
    pub start_usd: f64,

    //fraction of notional
    pub fee: f64,

    //valid range [0, 1)
    pub slippage_pct: f64,

    //[0, 1) fixes the spread, none or out of range uses the dynamic model
    #[serde(default)]
    pub spread_pct: Option<f64>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            symbol: String::new(),
            start_usd: 1000.0,
            fee: 0.001,
            slippage_pct: 0.0,
            spread_pct: None,
        }
    }
}

//where bars come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    CsvFile {
        path: PathBuf,
    },
    DataRoot {
        root: PathBuf,
        coin: String,
        interval: Interval,
        #[serde(default)]
        filter: BarFilter,
    },
}

//sma crossover strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmaParams {
    pub fast_window: usize,
    pub slow_window: usize,

    //share of usd committed per entry, (0, 1]
    pub fraction: f64,

    //queue limit orders at the bar average instead of trading at market
    #[serde(default)]
    pub use_limits: bool,
}

impl Default for SmaParams {
    fn default() -> Self {
        SmaParams {
            fast_window: 20,
            slow_window: 50,
            fraction: 1.0,
            use_limits: false,
        }
    }
}

//complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub data: DataSource,
    pub exchange: ExchangeConfig,
    pub strategy: SmaParams,

    //bars of history handed to the strategy
    #[serde(default = "default_max_lookback")]
    pub max_lookback: usize,

    //optional output paths
    #[serde(default)]
    pub output_equity_csv: Option<PathBuf>,
    #[serde(default)]
    pub output_trades_csv: Option<PathBuf>,
}

fn default_max_lookback() -> usize {
    500
}

impl Default for RunConfiguration {
    fn default() -> Self {
        RunConfiguration {
            data: DataSource::CsvFile {
                path: PathBuf::from("data.csv"),
            },
            exchange: ExchangeConfig::default(),
            strategy: SmaParams::default(),
            max_lookback: default_max_lookback(),
            output_equity_csv: None,
            output_trades_csv: None,
        }
    }
}

impl SmaParams {
    //catches bad parameters before any bar is replayed
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.fraction > 0.0 && self.fraction <= 1.0) {
            bail!("fraction must be in (0, 1], got {}", self.fraction);
        }
        if self.fast_window == 0 || self.fast_window >= self.slow_window {
            bail!(
                "fast window ({}) must be positive and below slow window ({})",
                self.fast_window,
                self.slow_window
            );
        }
        Ok(())
    }
}

impl RunConfiguration {
    //load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RunConfiguration = serde_json::from_str(&contents)?;
        config
            .strategy
            .validate()
            .with_context(|| format!("invalid strategy in {:?}", path))?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");

        let config = RunConfiguration {
            data: DataSource::DataRoot {
                root: PathBuf::from("/data"),
                coin: "enj".to_string(),
                interval: Interval::Hourly,
                filter: BarFilter {
                    years: vec![2025, 2026],
                    months: vec![1],
                },
            },
            exchange: ExchangeConfig {
                spread_pct: Some(0.0),
                ..ExchangeConfig::default()
            },
            ..RunConfiguration::default()
        };

        config.to_json_file(&path).unwrap();
        assert_eq!(RunConfiguration::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let json = r#"{
            "data": {"kind": "csv_file", "path": "bars.csv"},
            "exchange": {"symbol": "enj", "start_usd": 500, "fee": 0, "slippage_pct": 0},
            "strategy": {"fast_window": 3, "slow_window": 8, "fraction": 0.5}
        }"#;
        let config: RunConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.exchange.spread_pct, None);
        assert_eq!(config.max_lookback, 500);
        assert!(!config.strategy.use_limits);
    }

    #[test]
    fn test_out_of_range_fraction_fails_at_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.json");

        for fraction in [0.0, 1.5, f64::NAN] {
            let params = SmaParams {
                fraction,
                ..SmaParams::default()
            };
            assert!(params.validate().is_err());
        }

        let config = RunConfiguration {
            strategy: SmaParams {
                fraction: 1.5,
                ..SmaParams::default()
            },
            ..RunConfiguration::default()
        };
        config.to_json_file(&path).unwrap();
        assert!(RunConfiguration::from_json_file(&path).is_err());

        let swapped = SmaParams {
            fast_window: 50,
            slow_window: 20,
            ..SmaParams::default()
        };
        assert!(swapped.validate().is_err());
        assert!(SmaParams::default().validate().is_ok());
    }
}
