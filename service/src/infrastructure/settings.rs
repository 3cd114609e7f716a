use std::env;

use anyhow::Context;
use chrono::Duration;
use config::{Config, Environment, File};
use dotenvy::dotenv;
use inkwell_common::database::DatabaseSettings;
use serde::Deserialize;

use crate::domain::publication::PublicationOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_port: String,
    #[serde(default)]
    pub store: StoreKind,
    pub database: Option<DatabaseSettings>,
    #[serde(default)]
    pub publishing: PublishingSettings,
}

/// Where content records live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingSettings {
    #[serde(default = "default_min_lead_time_seconds")]
    pub min_lead_time_seconds: u32,
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    #[serde(default = "default_store_retry_seconds")]
    pub store_retry_seconds: u32,
}

fn default_min_lead_time_seconds() -> u32 {
    5
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_store_retry_seconds() -> u32 {
    5
}

impl Default for PublishingSettings {
    fn default() -> Self {
        Self {
            min_lead_time_seconds: default_min_lead_time_seconds(),
            max_conflict_retries: default_max_conflict_retries(),
            store_retry_seconds: default_store_retry_seconds(),
        }
    }
}

impl From<&PublishingSettings> for PublicationOptions {
    fn from(value: &PublishingSettings) -> Self {
        Self {
            min_lead_time: Duration::seconds(value.min_lead_time_seconds.into()),
            max_conflict_retries: value.max_conflict_retries,
            store_retry_interval: Duration::seconds(value.store_retry_seconds.into()),
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        let run_mode = load_env("RUN_MODE", "development");

        let s = Config::builder()
            .add_source(File::with_name("./config/default"))
            .add_source(File::with_name(&format!("./config/{run_mode}")).required(false))
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        s.try_deserialize().with_context(|| "failed to read config")
    }

    /// Database settings, required by the postgres store
    pub fn database(&self) -> anyhow::Result<&DatabaseSettings> {
        self.database
            .as_ref()
            .context("store is postgres but no database settings are configured")
    }
}

fn load_env(key: &str, default_value: &'static str) -> String {
    env::var(key).unwrap_or_else(|_| default_value.into())
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(yaml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn publishing_defaults_apply_when_omitted() {
        let settings = parse("server_port: \"3000\"\n");

        assert_eq!(settings.store, StoreKind::Memory);
        assert!(settings.database().is_err());

        let options = PublicationOptions::from(&settings.publishing);
        assert_eq!(options, PublicationOptions::default());
    }

    #[test]
    fn publishing_values_are_read() {
        let settings = parse(
            "server_port: \"3000\"\nstore: postgres\npublishing:\n  min_lead_time_seconds: 30\n  store_retry_seconds: 2\n",
        );

        assert_eq!(settings.store, StoreKind::Postgres);
        let options = PublicationOptions::from(&settings.publishing);
        assert_eq!(options.min_lead_time, Duration::seconds(30));
        assert_eq!(options.max_conflict_retries, 3);
        assert_eq!(options.store_retry_interval, Duration::seconds(2));
    }
}
