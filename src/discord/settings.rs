//! config file options for the discord session

use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use url::Url;

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
/// credentials and connection options of the bot
pub struct DiscordSettings {
	/// bot token, sent as `Authorization: Bot <token>`
	pub bot_token: String,
	/// application id, identical to the user id of the bot
	pub application_id: String,
	/// restrict routing to this guild
	#[serde(default)]
	pub guild_id: Option<String>,
	/// base url of the discord REST api
	#[serde(default = "default_api_base")]
	pub api_base: Url,
	/// timeout of a single http request
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	#[serde(default = "default_request_timeout")]
	pub request_timeout: Duration,
	/// how long we keep waiting out ratelimits before giving up
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	#[serde(default = "default_max_ratelimit_wait")]
	pub max_ratelimit_wait: Duration,
}

#[allow(clippy::expect_used)]
fn default_api_base() -> Url {
	Url::parse("https://discord.com/api/v10/").expect("static url is valid")
}

fn default_request_timeout() -> Duration {
	Duration::from_secs(10)
}

fn default_max_ratelimit_wait() -> Duration {
	Duration::from_secs(30)
}
