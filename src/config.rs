use std::env;
use std::error::Error;
use std::fmt;

use tracing::error;

pub const DEFAULT_PORT: u16 = 5004;
const PORT_ARGUMENT: &str = "mlAgentPort=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcademyConfig {
    pub host: String,
    pub port: u16,
    pub replays_folder: Option<String>,
    /// Bound for the demo loop. `None` runs until the trainer quits.
    pub max_steps: Option<u64>,
}

impl Default for AcademyConfig {
    fn default() -> Self {
        AcademyConfig {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            replays_folder: None,
            max_steps: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value } => {
                write!(formatter, "Invalid value '{}' for {}", value, key)
            }
        }
    }
}

impl Error for ConfigError {}

fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| {
        error!("Invalid value '{}' for {}", value, key);
        ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }
    })
}

impl AcademyConfig {
    /// Reads the process environment and command line.
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = env::args().skip(1).collect();
        Self::from_lookup(|key| env::var(key).ok(), &args)
    }

    /// Builds the configuration from `lookup` and the command line `args`.
    /// A `mlAgentPort=<port>` argument wins over `LOCKSTEP_PORT`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        args: &[String],
    ) -> Result<Self, ConfigError> {
        let mut config = AcademyConfig::default();

        if let Some(host) = lookup("LOCKSTEP_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("LOCKSTEP_PORT") {
            config.port = parse("LOCKSTEP_PORT", port)?;
        }
        config.replays_folder = lookup("LOCKSTEP_REPLAYS_FOLDER").filter(|folder| !folder.is_empty());
        if let Some(max_steps) = lookup("LOCKSTEP_MAX_STEPS") {
            config.max_steps = Some(parse("LOCKSTEP_MAX_STEPS", max_steps)?);
        }

        for arg in args {
            if let Some(port) = arg.strip_prefix(PORT_ARGUMENT) {
                config.port = parse(PORT_ARGUMENT, port.to_string())?;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AcademyConfig::from_lookup(lookup(&[]), &[]).unwrap();

        assert_eq!(config, AcademyConfig::default());
        assert_eq!(config.port, 5004);
    }

    #[test]
    fn test_values_from_lookup() {
        let config = AcademyConfig::from_lookup(
            lookup(&[
                ("LOCKSTEP_HOST", "trainer"),
                ("LOCKSTEP_PORT", "6000"),
                ("LOCKSTEP_REPLAYS_FOLDER", "/tmp/replays"),
                ("LOCKSTEP_MAX_STEPS", "100"),
            ]),
            &[],
        )
        .unwrap();

        assert_eq!(config.host, "trainer");
        assert_eq!(config.port, 6000);
        assert_eq!(config.replays_folder.as_deref(), Some("/tmp/replays"));
        assert_eq!(config.max_steps, Some(100));
    }

    #[test]
    fn test_port_argument_overrides_environment() {
        let args = vec!["--verbose".to_string(), "mlAgentPort=5010".to_string()];

        let config = AcademyConfig::from_lookup(lookup(&[("LOCKSTEP_PORT", "6000")]), &args).unwrap();

        assert_eq!(config.port, 5010);
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let result = AcademyConfig::from_lookup(lookup(&[("LOCKSTEP_PORT", "abc")]), &[]);

        assert_eq!(
            result,
            Err(ConfigError::InvalidValue {
                key: "LOCKSTEP_PORT".to_string(),
                value: "abc".to_string()
            })
        );
    }
}
