//! Provider settings, loaded from a mounted YAML file.

use std::fmt;
use std::time::Duration;

use managed::ReconcilerConfig;
use serde::{Deserialize, Serialize};

/// Resource kinds this provider can reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ControllerKind {
    NodeGroup,
    Authorizer,
    #[serde(rename = "APIMapping")]
    ApiMapping,
    #[serde(rename = "SNSSubscription")]
    SnsSubscription,
}

impl ControllerKind {
    pub const ALL: [Self; 4] = [
        Self::NodeGroup,
        Self::Authorizer,
        Self::ApiMapping,
        Self::SnsSubscription,
    ];
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NodeGroup => "NodeGroup",
            Self::Authorizer => "Authorizer",
            Self::ApiMapping => "APIMapping",
            Self::SnsSubscription => "SNSSubscription",
        })
    }
}

/// Main provider configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderSettings {
    /// Seconds between observations of an up-to-date resource
    #[serde(rename = "pollIntervalSeconds", default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Seconds to wait after a create, a delete or an error
    #[serde(rename = "shortWaitSeconds", default = "default_short_wait")]
    pub short_wait_seconds: u64,

    /// Resources of one kind reconciled in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: u16,

    /// Controllers to start
    #[serde(default = "default_controllers")]
    pub controllers: Vec<ControllerKind>,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_short_wait() -> u64 {
    30
}

fn default_concurrency() -> u16 {
    1
}

fn default_controllers() -> Vec<ControllerKind> {
    ControllerKind::ALL.to_vec()
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            short_wait_seconds: default_short_wait(),
            concurrency: default_concurrency(),
            controllers: default_controllers(),
        }
    }
}

impl ProviderSettings {
    /// Load settings from a mounted ConfigMap file
    pub fn from_file(path: &str) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {path}: {e}"))?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, anyhow::Error> {
        serde_yaml::from_str(yaml).map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {e}"))
    }

    /// Validate that intervals and concurrency are usable
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.poll_interval_seconds == 0 {
            return Err(anyhow::anyhow!("pollIntervalSeconds must be greater than zero"));
        }
        if self.short_wait_seconds == 0 {
            return Err(anyhow::anyhow!("shortWaitSeconds must be greater than zero"));
        }
        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("concurrency must be greater than zero"));
        }
        if self.controllers.is_empty() {
            return Err(anyhow::anyhow!("at least one controller must be enabled"));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_enabled(&self, kind: ControllerKind) -> bool {
        self.controllers.contains(&kind)
    }

    #[must_use]
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
            short_wait: Duration::from_secs(self.short_wait_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let settings = ProviderSettings::from_yaml("{}").unwrap();
        assert_eq!(settings, ProviderSettings::default());
        assert_eq!(settings.reconciler_config(), ReconcilerConfig::default());
        assert!(settings.validate().is_ok());
        for kind in ControllerKind::ALL {
            assert!(settings.is_enabled(kind), "{kind}");
        }
    }

    #[test]
    fn parses_overrides() {
        let yaml = r"
pollIntervalSeconds: 300
shortWaitSeconds: 10
concurrency: 4
controllers:
  - NodeGroup
  - SNSSubscription
";
        let settings = ProviderSettings::from_yaml(yaml).unwrap();
        assert_eq!(settings.concurrency, 4);
        assert_eq!(
            settings.reconciler_config(),
            ReconcilerConfig {
                poll_interval: Duration::from_secs(300),
                short_wait: Duration::from_secs(10),
            }
        );
        assert!(settings.is_enabled(ControllerKind::SnsSubscription));
        assert!(!settings.is_enabled(ControllerKind::ApiMapping));
    }

    #[test]
    fn rejects_unknown_controller() {
        assert!(ProviderSettings::from_yaml("controllers: [Bucket]").is_err());
    }

    #[test]
    fn validate_rejects_zero_values() {
        let cases = [
            ("zero poll interval", ProviderSettings { poll_interval_seconds: 0, ..ProviderSettings::default() }),
            ("zero short wait", ProviderSettings { short_wait_seconds: 0, ..ProviderSettings::default() }),
            ("zero concurrency", ProviderSettings { concurrency: 0, ..ProviderSettings::default() }),
            ("no controllers", ProviderSettings { controllers: Vec::new(), ..ProviderSettings::default() }),
        ];
        for (name, settings) in cases {
            assert!(settings.validate().is_err(), "{name}");
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ProviderSettings::from_file("/nonexistent/provider.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/provider.yaml"));
    }
}
