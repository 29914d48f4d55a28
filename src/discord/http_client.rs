//! [ChatSession] implementation on top of the discord REST api. Records
//! prometheus metrics for every request and waits out ratelimits.
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use reqwest::{header, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{
	model::{Channel, Guild, Message},
	settings::DiscordSettings,
	ChatSession, SessionError,
};
use crate::outbound_message::OutboundMessage;

#[derive(Debug, Clone)]
/// prometheus meters for the discord http client
struct Metrics {
	/// total number of http requests
	http_requests: IntCounterVec,
	/// total number of failed http requests
	http_requests_failed: IntCounterVec,
	/// time spent by http requests
	http_request_duration: HistogramVec,
}

impl Metrics {
	/// construct and register prometheus meters
	pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
		let http_requests = IntCounterVec::new(
			Opts::new("requests_total", "total number of http requests")
				.namespace("hobbyist")
				.subsystem("discord_http_client"),
			&["endpoint"],
		)?;

		let http_requests_failed = IntCounterVec::new(
			Opts::new("requests_failed", "number of failed http requests")
				.namespace("hobbyist")
				.subsystem("discord_http_client"),
			&["endpoint", "status_code"],
		)?;

		let http_request_duration = HistogramVec::new(
			HistogramOpts::new("request_duration_seconds", "total time of a http request in seconds")
				.buckets(prometheus::exponential_buckets(0.01, 2., 12)?)
				.namespace("hobbyist")
				.subsystem("discord_http_client"),
			&["endpoint"],
		)?;

		registry.register(Box::new(http_requests.clone()))?;
		registry.register(Box::new(http_requests_failed.clone()))?;
		registry.register(Box::new(http_request_duration.clone()))?;

		Ok(Self { http_requests, http_requests_failed, http_request_duration })
	}
}

/// body of a 429 response
#[derive(Debug, Deserialize)]
struct RateLimited {
	/// seconds to wait before retrying
	retry_after: Option<f64>,
}

/// body of other error responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
	message: String,
}

#[derive(Debug, Clone)]
/// http client for the discord REST api
pub struct DiscordClient {
	/// http client
	client: reqwest::Client,
	/// api base url without trailing slash
	api_base: String,
	/// `Bot <token>`
	authorization: String,
	/// give up on ratelimits after this long
	max_ratelimit_wait: Duration,
	/// prometheus meters for http requests
	metrics: Metrics,
}

impl DiscordClient {
	/// construct http client and register its meters in `registry`
	pub fn new(settings: &DiscordSettings, registry: &Registry) -> Result<Self> {
		let user_agent = format!(
			"DiscordBot ({}, {})",
			env!("CARGO_PKG_NAME"),
			env!("CARGO_PKG_VERSION")
		);

		Ok(Self {
			client: reqwest::Client::builder()
				.timeout(settings.request_timeout)
				.user_agent(user_agent)
				.build()
				.context("failed to build reqwest client")?,
			api_base: settings.api_base.as_str().trim_end_matches('/').to_owned(),
			authorization: format!("Bot {}", settings.bot_token),
			max_ratelimit_wait: settings.max_ratelimit_wait,
			metrics: Metrics::new(registry).context("failed to register prometheus meters")?,
		})
	}

	fn request(&self, method: Method, path: &str) -> RequestBuilder {
		self.client
			.request(method, format!("{}/{}", self.api_base, path))
			.header(header::AUTHORIZATION, self.authorization.as_str())
	}

	/// Execute a request, waiting out ratelimits as long as the total wait
	/// stays within `max_ratelimit_wait`. A ratelimit that would exceed it
	/// fails immediately.
	///
	/// # Arguments
	///
	/// * `endpoint` - endpoint name used as metric label and in errors
	///
	/// * `build` - constructs the request, called once per attempt
	async fn execute<T, F>(&self, endpoint: &str, build: F) -> Result<T, SessionError>
	where
		T: DeserializeOwned,
		F: Fn() -> RequestBuilder,
	{
		let mut backoff = ExponentialBackoff {
			max_elapsed_time: Some(self.max_ratelimit_wait),
			..Default::default()
		};

		loop {
			let timer =
				self.metrics.http_request_duration.with_label_values(&[endpoint]).start_timer();
			self.metrics.http_requests.with_label_values(&[endpoint]).inc();

			let response = build().send().await;
			timer.observe_duration();

			let response = response?;
			let status = response.status();

			if status.is_success() {
				return Ok(response.json().await?);
			}

			self.metrics
				.http_requests_failed
				.with_label_values(&[endpoint, status.as_str()])
				.inc();

			if status == StatusCode::TOO_MANY_REQUESTS {
				let retry_after = response
					.json::<RateLimited>()
					.await
					.ok()
					.and_then(|body| body.retry_after)
					.filter(|seconds| seconds.is_finite() && *seconds >= 0.)
					.map(Duration::from_secs_f64);

				let remaining = self.max_ratelimit_wait.saturating_sub(backoff.get_elapsed_time());
				let wait = match (retry_after, backoff.next_backoff()) {
					(Some(retry_after), Some(_)) => retry_after,
					(None, Some(fallback)) => fallback.min(remaining),
					(_, None) => Duration::MAX,
				};

				if wait > remaining {
					tracing::warn!(endpoint, wait = ?wait, "ratelimit exceeds the remaining wait budget");
					return Err(SessionError::RateLimited { route: endpoint.to_owned() });
				}

				tracing::warn!(endpoint, wait = ?wait, "ratelimited by discord");
				tokio::time::sleep(wait).await;
				continue;
			}

			let body = response.text().await.unwrap_or_default();
			let message = serde_json::from_str::<ApiErrorBody>(&body)
				.map(|body| body.message)
				.unwrap_or(body);

			return Err(SessionError::Api { status: status.as_u16(), message });
		}
	}

	async fn create_message<B: Serialize + Sync>(
		&self,
		channel_id: &str,
		body: &B,
	) -> Result<Message, SessionError> {
		let path = format!("channels/{channel_id}/messages");

		self.execute("create_message", || self.request(Method::POST, &path).json(body)).await
	}
}

#[async_trait]
impl ChatSession for DiscordClient {
	async fn guilds(&self) -> Result<Vec<Guild>, SessionError> {
		self.execute("guilds", || self.request(Method::GET, "users/@me/guilds")).await
	}

	async fn guild_channels(&self, guild_id: &str) -> Result<Vec<Channel>, SessionError> {
		let path = format!("guilds/{guild_id}/channels");

		self.execute("guild_channels", || self.request(Method::GET, &path)).await
	}

	async fn send_message(
		&self,
		channel_id: &str,
		message: &OutboundMessage,
	) -> Result<Message, SessionError> {
		self.create_message(channel_id, &message.payload(None)).await
	}

	async fn send_reply(
		&self,
		channel_id: &str,
		message: &OutboundMessage,
		reply_to: &str,
	) -> Result<Message, SessionError> {
		self.create_message(channel_id, &message.payload(Some(reply_to))).await
	}

	async fn recent_messages(
		&self,
		channel_id: &str,
		limit: u8,
	) -> Result<Vec<Message>, SessionError> {
		let path = format!("channels/{channel_id}/messages");
		let limit = limit.to_string();

		self.execute("channel_messages", || {
			self.request(Method::GET, &path).query(&[("limit", limit.as_str())])
		})
		.await
	}

	async fn send_text(&self, channel_id: &str, text: &str) -> Result<Message, SessionError> {
		self.create_message(channel_id, &OutboundMessage::text_payload(text)).await
	}
}
