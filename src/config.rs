use std::env;
use std::path::PathBuf;

/// Server settings, read once at startup from `STAYLEDGER_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Log appends after which the compactor rewrites the WAL.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    /// Reject booked ranges that carry no client name.
    pub require_client_name: bool,
    /// Keep everything in memory; nothing is written under `data_dir`.
    pub in_memory: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            metrics_port: None,
            require_client_name: false,
            in_memory: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let parse_bool = |key: &str, default: bool| match get(key).map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            _ => default,
        };

        Self {
            bind: get("STAYLEDGER_BIND").unwrap_or(defaults.bind),
            port: get("STAYLEDGER_PORT")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.port),
            data_dir: get("STAYLEDGER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            compact_threshold: get("STAYLEDGER_COMPACT_THRESHOLD")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            metrics_port: get("STAYLEDGER_METRICS_PORT").and_then(|raw| raw.parse().ok()),
            require_client_name: parse_bool("STAYLEDGER_REQUIRE_CLIENT_NAME", defaults.require_client_name),
            in_memory: parse_bool("STAYLEDGER_IN_MEMORY", defaults.in_memory),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("properties.wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(config_from(&[]), Config::default());
        assert_eq!(Config::default().listen_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn reads_and_trims_values() {
        let config = config_from(&[
            ("STAYLEDGER_PORT", " 9090 "),
            ("STAYLEDGER_DATA_DIR", "/var/lib/stayledger"),
            ("STAYLEDGER_METRICS_PORT", "9100"),
            ("STAYLEDGER_REQUIRE_CLIENT_NAME", "Yes"),
            ("STAYLEDGER_IN_MEMORY", "1"),
        ]);
        assert_eq!(config.port, 9090);
        assert_eq!(config.metrics_port, Some(9100));
        assert!(config.require_client_name);
        assert!(config.in_memory);
        assert_eq!(config.wal_path(), PathBuf::from("/var/lib/stayledger/properties.wal"));
    }

    #[test]
    fn unparsable_values_fall_back() {
        let config = config_from(&[
            ("STAYLEDGER_PORT", "eighty"),
            ("STAYLEDGER_COMPACT_THRESHOLD", "-5"),
            ("STAYLEDGER_IN_MEMORY", "maybe"),
            ("STAYLEDGER_BIND", "   "),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.compact_threshold, 1000);
        assert!(!config.in_memory);
        assert_eq!(config.bind, "0.0.0.0");
    }
}
