//! INI file configuration adapter.

use crate::domain::error::SignalsimError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SignalsimError> {
        let mut config = Ini::new();
        config
            .load(path.as_ref())
            .map_err(|reason| SignalsimError::ConfigParse {
                file: path.as_ref().display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[backtest]
initial_capital = 1000000.0
transaction_cost_pct = 0.001

[equity]
position_size = 0.20
max_positions = 3

[futures]
sessions = 09:15-12:00,13:00-15:30
"#;

    #[test]
    fn from_string_reads_sections() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(
            adapter.get_double("backtest", "initial_capital", 0.0),
            1_000_000.0
        );
        assert_eq!(adapter.get_int("equity", "max_positions", 0), 3);
        assert_eq!(
            adapter.get_string("futures", "sessions"),
            Some("09:15-12:00,13:00-15:30".to_string())
        );
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let adapter = FileConfigAdapter::from_string("[backtest]\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_int("backtest", "missing", 42), 42);
        assert_eq!(adapter.get_double("missing_section", "key", 9.5), 9.5);
        assert!(adapter.get_bool("backtest", "missing", true));
    }

    #[test]
    fn non_numeric_values_fall_back_to_defaults() {
        let adapter =
            FileConfigAdapter::from_string("[equity]\nmax_positions = lots\nposition_size = big\n")
                .unwrap();
        assert_eq!(adapter.get_int("equity", "max_positions", 3), 3);
        assert_eq!(adapter.get_double("equity", "position_size", 0.2), 0.2);
    }

    #[test]
    fn bool_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[a]\nx = yes\ny = 0\nz = maybe\n").unwrap();
        assert!(adapter.get_bool("a", "x", false));
        assert!(!adapter.get_bool("a", "y", true));
        assert!(adapter.get_bool("a", "z", true));
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_double("equity", "position_size", 0.0), 0.20);
    }

    #[test]
    fn from_file_missing_path_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/signalsim.ini").unwrap_err();
        assert!(matches!(err, SignalsimError::ConfigParse { .. }));
    }
}
