use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt,
	util::SubscriberInitExt, EnvFilter,
};

use crate::settings::Settings;

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
	pub level: String,
}

impl LogSettings {
	pub fn global() -> &'static Self {
		&Settings::global().log
	}
}

/// filter for the configured level, dependencies are kept quiet
fn filter(level: &str) -> Result<EnvFilter> {
	let level = tracing::Level::from_str(level)
		.map_err(|err| anyhow::anyhow!("invalid log level {level:?}: {err}"))?;

	Ok(EnvFilter::default()
		.add_directive(LevelFilter::from_level(level).into())
		.add_directive("hyper=warn".parse()?)
		.add_directive("reqwest=warn".parse()?)
		.add_directive("rustls=warn".parse()?))
}

pub fn setup_logging() -> Result<()> {
	let filter_layer = filter(LogSettings::global().level.as_str())?;

	let fmt_layer = fmt::layer();

	tracing_subscriber::registry()
		.with(filter_layer)
		.with(fmt_layer)
		.try_init()
		.context("a global subscriber was already installed")?;

	Ok(())
}
