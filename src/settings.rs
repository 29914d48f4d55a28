use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::{Config, Environment, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use thiserror::Error;

use crate::{
	correlation::{MatchPolicy, MAX_HISTORY_LIMIT},
	discord::settings::DiscordSettings,
	log::LogSettings,
	telemetry_endpoint::TelemetryEndpointSettings,
	webhook_receiver::WebhookReceiverSettings,
};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// prefix of environment variables overriding the config file
const ENV_PREFIX: &str = "HOBBYIST";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub discord: DiscordSettings,
	/// route key (`/group/channel`) of the channel receiving diagnostic messages
	pub info_channel_key: String,
	pub webhook_receiver: WebhookReceiverSettings,
	pub telemetry_endpoint: TelemetryEndpointSettings,
	#[serde(default)]
	pub correlation: CorrelationSettings,
	pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
/// how resolved alerts find their firing message
pub struct CorrelationSettings {
	#[serde(default)]
	pub match_policy: MatchPolicy,
	/// number of recent channel messages scanned
	#[serde(default = "default_history_limit")]
	pub history_limit: u8,
}

impl Default for CorrelationSettings {
	fn default() -> Self {
		Self { match_policy: MatchPolicy::default(), history_limit: default_history_limit() }
	}
}

fn default_history_limit() -> u8 {
	MAX_HISTORY_LIMIT
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
	#[error("{0} is required")]
	Missing(&'static str),
	#[error("correlation.history_limit must be between 1 and {MAX_HISTORY_LIMIT}, got {0}")]
	HistoryLimit(u8),
}

impl Settings {
	pub fn global() -> &'static Self {
		SETTINGS.get_or_init(|| {
			match Self::load().context("failed to load config and command line arguments") {
				Ok(settings) => settings,
				Err(err) => {
					// tracing wasn't setup yet
					eprintln!("{err:#?}");
					std::process::exit(1);
				}
			}
		})
	}

	fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args(&[
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
				Arg::new("level")
					.help("log level")
					.possible_values(["error", "warn", "info", "debug", "trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
			])
			.get_matches();

		let config_path = opts.value_of("config").context("missing config path")?;

		let conf = Config::builder()
			.add_source(File::with_name(config_path))
			.add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__"))
			.build()
			.context("can't load config")?;

		let mut settings: Settings = conf.try_deserialize().context("can't load config")?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}

		settings.validate()?;

		Ok(settings)
	}

	/// reject settings the bot can't work with
	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.discord.bot_token.is_empty() {
			return Err(SettingsError::Missing("discord.bot_token"));
		}

		if self.discord.application_id.is_empty() {
			return Err(SettingsError::Missing("discord.application_id"));
		}

		if self.info_channel_key.is_empty() {
			return Err(SettingsError::Missing("info_channel_key"));
		}

		let limit = self.correlation.history_limit;
		if limit == 0 || limit > MAX_HISTORY_LIMIT {
			return Err(SettingsError::HistoryLimit(limit));
		}

		Ok(())
	}
}
