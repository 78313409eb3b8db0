use crate::toggle::Consistency;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_PATH: &str = "data/state.json";

/// Settings read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    /// Forces compare-and-swap on every toggle.
    pub strict_toggles: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let data_path = lookup("APP_DATA_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));
        let strict_toggles = lookup("APP_STRICT_TOGGLES")
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            port,
            data_path,
            strict_toggles,
        }
    }

    pub fn consistency(&self, requested_cas: bool) -> Consistency {
        if self.strict_toggles || requested_cas {
            Consistency::CompareAndSwap
        } else {
            Consistency::LastWriteWins
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_path, PathBuf::from("data/state.json"));
        assert!(!config.strict_toggles);
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("PORT", "9090"),
            ("APP_DATA_PATH", "/tmp/habits.json"),
            ("APP_STRICT_TOGGLES", "True"),
        ]);
        assert_eq!(config.port, 9090);
        assert_eq!(config.data_path, PathBuf::from("/tmp/habits.json"));
        assert!(config.strict_toggles);
    }

    #[test]
    fn bad_port_falls_back() {
        assert_eq!(config(&[("PORT", "http")]).port, 8080);
    }

    #[test]
    fn strict_mode_forces_compare_and_swap() {
        let relaxed = Config::default();
        assert_eq!(relaxed.consistency(false), Consistency::LastWriteWins);
        assert_eq!(relaxed.consistency(true), Consistency::CompareAndSwap);

        let strict = config(&[("APP_STRICT_TOGGLES", "1")]);
        assert_eq!(strict.consistency(false), Consistency::CompareAndSwap);
    }
}
