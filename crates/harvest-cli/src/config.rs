use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// JSON snapshot to evaluate; the demo portfolio when absent
    pub snapshot_path: Option<PathBuf>,
    /// Defaults to today (UTC)
    pub evaluation_date: Option<NaiveDate>,
    pub output: OutputFormat,
    pub min_loss_amount: Option<f64>,
    pub min_loss_percentage: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("Missing value for flag {0}")]
    MissingFlagValue(String),
    #[error("Unknown flag: {0}")]
    UnknownFlag(String),
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), format!("expected YYYY-MM-DD, got {}", value))
    })
}

fn parse_amount(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| {
            ConfigError::InvalidValue(key.to_string(), "must be a non-negative number".to_string())
        })
}

impl CliConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let snapshot_path = env_map
            .get("HARVEST_SNAPSHOT")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let evaluation_date = env_map
            .get("HARVEST_EVALUATION_DATE")
            .map(|s| parse_date("HARVEST_EVALUATION_DATE", s))
            .transpose()?;

        let output = match env_map
            .get("HARVEST_OUTPUT")
            .map(|s| s.as_str())
            .unwrap_or("text")
        {
            "text" => OutputFormat::Text,
            "json" => OutputFormat::Json,
            other => {
                return Err(ConfigError::InvalidValue(
                    "HARVEST_OUTPUT".to_string(),
                    format!("must be text or json, got {}", other),
                ))
            }
        };

        let min_loss_amount = env_map
            .get("HARVEST_MIN_LOSS_AMOUNT")
            .map(|s| parse_amount("HARVEST_MIN_LOSS_AMOUNT", s))
            .transpose()?;

        let min_loss_percentage = env_map
            .get("HARVEST_MIN_LOSS_PCT")
            .map(|s| parse_amount("HARVEST_MIN_LOSS_PCT", s))
            .transpose()?;
        if let Some(pct) = min_loss_percentage.filter(|p| *p > 1.0) {
            return Err(ConfigError::InvalidValue(
                "HARVEST_MIN_LOSS_PCT".to_string(),
                format!("must be a fraction between 0 and 1, got {}", pct),
            ));
        }

        Ok(CliConfig {
            snapshot_path,
            evaluation_date,
            output,
            min_loss_amount,
            min_loss_percentage,
        })
    }

    /// Apply command-line flags on top of the environment
    pub fn apply_args<I>(mut self, args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--demo" => self.snapshot_path = None,
                "--json" => self.output = OutputFormat::Json,
                "--text" => self.output = OutputFormat::Text,
                "--snapshot" => {
                    let path = args
                        .next()
                        .ok_or_else(|| ConfigError::MissingFlagValue(arg.clone()))?;
                    self.snapshot_path = Some(PathBuf::from(path));
                }
                "--date" => {
                    let value = args
                        .next()
                        .ok_or_else(|| ConfigError::MissingFlagValue(arg.clone()))?;
                    self.evaluation_date = Some(parse_date("--date", &value)?);
                }
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::from_env_map(HashMap::new()).unwrap();
        assert_eq!(config.snapshot_path, None);
        assert_eq!(config.evaluation_date, None);
        assert_eq!(config.output, OutputFormat::Text);
    }

    #[test]
    fn test_env_values() {
        let mut env_map = HashMap::new();
        env_map.insert("HARVEST_SNAPSHOT".to_string(), "/tmp/snapshot.json".to_string());
        env_map.insert("HARVEST_EVALUATION_DATE".to_string(), "2024-11-20".to_string());
        env_map.insert("HARVEST_OUTPUT".to_string(), "json".to_string());
        env_map.insert("HARVEST_MIN_LOSS_AMOUNT".to_string(), "500".to_string());

        let config = CliConfig::from_env_map(env_map).unwrap();
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/snapshot.json")));
        assert_eq!(config.evaluation_date, NaiveDate::from_ymd_opt(2024, 11, 20));
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.min_loss_amount, Some(500.0));
    }

    #[test]
    fn test_invalid_output() {
        let mut env_map = HashMap::new();
        env_map.insert("HARVEST_OUTPUT".to_string(), "yaml".to_string());
        match CliConfig::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "HARVEST_OUTPUT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_percentage() {
        let mut env_map = HashMap::new();
        env_map.insert("HARVEST_MIN_LOSS_PCT".to_string(), "5".to_string());
        match CliConfig::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "HARVEST_MIN_LOSS_PCT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_flags_override_env() {
        let mut env_map = HashMap::new();
        env_map.insert("HARVEST_SNAPSHOT".to_string(), "/tmp/snapshot.json".to_string());

        let config = CliConfig::from_env_map(env_map)
            .unwrap()
            .apply_args(args(&["--demo", "--json", "--date", "2024-12-31"]))
            .unwrap();

        assert_eq!(config.snapshot_path, None);
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.evaluation_date, NaiveDate::from_ymd_opt(2024, 12, 31));
    }

    #[test]
    fn test_bad_flags() {
        let base = CliConfig::from_env_map(HashMap::new()).unwrap();
        assert!(matches!(
            base.clone().apply_args(args(&["--date"])),
            Err(ConfigError::MissingFlagValue(_))
        ));
        assert!(matches!(
            base.apply_args(args(&["--verbose"])),
            Err(ConfigError::UnknownFlag(_))
        ));
    }
}
