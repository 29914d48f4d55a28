//! Handles a single webhook request: parse the payload, route it to a
//! channel, render every alert and send it, replying to the firing message
//! for resolved alerts.
//!
//! Alerts of a batch are sent strictly in payload order. A resolved alert
//! may need to find a firing message that was sent earlier in the same
//! batch, and discord ratelimits bursts anyway.

use std::sync::Arc;

use prometheus::{IntCounterVec, Opts, Registry};
use thiserror::Error;

use crate::{
	alert::Alert,
	correlation::{CorrelationError, Correlator},
	discord::{ChatSession, SessionError},
	message_renderer,
	outbound_message::OutboundMessage,
	routes::{route_key, ChannelHandle, ChannelRoutes, RouteFetchError},
	webhook_payload::{self, ParseError},
};

/// error returned to the webhook receiver, the batch was aborted
#[derive(Error, Debug)]
pub enum DispatchError {
	#[error("error parsing request body as webhook: {0}")]
	Parse(#[from] ParseError),
	#[error(transparent)]
	RouteFetch(#[from] RouteFetchError),
	#[error("no route found for path {key}")]
	RouteNotFound { key: String },
	#[error("error sending alert {index} to channel {channel}: {source}")]
	Send {
		/// position of the alert in the batch
		index: usize,
		channel: String,
		#[source]
		source: SessionError,
	},
}

impl DispatchError {
	/// metric label
	fn reason(&self) -> &'static str {
		match self {
			Self::Parse(_) => "parse",
			Self::RouteFetch(_) => "route_fetch",
			Self::RouteNotFound { .. } => "route_not_found",
			Self::Send { .. } => "send",
		}
	}
}

/// what happened to a successfully dispatched batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
	/// number of messages sent, including replies
	pub sent: usize,
	/// number of resolved alerts sent as reply to their firing message
	pub threaded: usize,
}

#[derive(Debug, Clone)]
/// prometheus meters of the dispatcher
struct DispatchMetrics {
	/// alerts sent, by outcome
	alerts: IntCounterVec,
	/// aborted batches, by reason
	failures: IntCounterVec,
}

impl DispatchMetrics {
	fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
		let alerts = IntCounterVec::new(
			Opts::new("alerts_total", "number of alerts sent into discord channels")
				.namespace("hobbyist")
				.subsystem("dispatch"),
			&["outcome"],
		)?;
		let failures = IntCounterVec::new(
			Opts::new("failures_total", "number of aborted webhook requests")
				.namespace("hobbyist")
				.subsystem("dispatch"),
			&["reason"],
		)?;

		registry.register(Box::new(alerts.clone()))?;
		registry.register(Box::new(failures.clone()))?;

		Ok(Self { alerts, failures })
	}
}

/// dispatcher options taken from the settings
#[derive(Debug, Clone)]
pub struct DispatchOptions {
	/// route key of the channel receiving diagnostic messages
	pub info_channel_key: String,
	/// restrict routing to this guild
	pub guild_id: Option<String>,
}

/// forwards webhook payloads into discord channels
pub struct Dispatcher {
	session: Arc<dyn ChatSession>,
	correlator: Correlator,
	options: DispatchOptions,
	metrics: DispatchMetrics,
}

impl Dispatcher {
	pub fn new(
		session: Arc<dyn ChatSession>,
		correlator: Correlator,
		options: DispatchOptions,
		registry: &Registry,
	) -> Result<Self, prometheus::Error> {
		let metrics = DispatchMetrics::new(registry)?;

		Ok(Self { session, correlator, options, metrics })
	}

	/// Forward the alerts of a webhook body into the channel `/group/channel`.
	///
	/// Parse and routing failures abort the request and post a diagnostic
	/// into the info channel. The first failed send aborts the remaining
	/// alerts, already sent messages stay.
	pub async fn dispatch(
		&self,
		group: &str,
		channel: &str,
		body: &[u8],
	) -> Result<DispatchReport, DispatchError> {
		let result = self.try_dispatch(group, channel, body).await;

		if let Err(err) = &result {
			self.metrics.failures.with_label_values(&[err.reason()]).inc();
		}

		result
	}

	async fn try_dispatch(
		&self,
		group: &str,
		channel: &str,
		body: &[u8],
	) -> Result<DispatchReport, DispatchError> {
		let webhook = match webhook_payload::parse(body) {
			Ok(webhook) => webhook,
			Err(err) => {
				tracing::error!(
					body = %String::from_utf8_lossy(body),
					"error parsing request body as webhook: {err}"
				);

				match ChannelRoutes::build(self.session.as_ref(), self.options.guild_id.as_deref())
					.await
				{
					Ok(routes) => {
						self.notify_info(
							&routes,
							"An invalid payload was sent to the webhook. Check the webhook configuration in Grafana and the hobbyist logs for the full payload.",
						)
						.await;
					}
					Err(route_err) => tracing::error!("can't reach info channel: {route_err}"),
				}

				return Err(err.into());
			}
		};

		let routes =
			ChannelRoutes::build(self.session.as_ref(), self.options.guild_id.as_deref()).await?;

		let Some(destination) = routes.resolve(group, channel) else {
			let key = route_key(group, channel);
			tracing::error!(route = %key, "no route found for path");

			self.notify_info(
				&routes,
				&format!("no route found for path {key}. Is there a typo in the configured URL?"),
			)
			.await;

			return Err(DispatchError::RouteNotFound { key });
		};

		let image = webhook.image_url();
		let mut report = DispatchReport::default();

		for (index, alert) in webhook.batch.alerts.iter().enumerate() {
			let message = message_renderer::render(alert, image);

			if alert.is_resolved() && self.send_reply(destination, alert, &message).await {
				report.sent += 1;
				report.threaded += 1;
				self.metrics.alerts.with_label_values(&["threaded"]).inc();
				continue;
			}

			if let Err(source) = self.session.send_message(&destination.id, &message).await {
				tracing::error!(channel = %destination.name, "error sending message to channel: {source}");

				return Err(DispatchError::Send { index, channel: destination.name.clone(), source });
			}

			report.sent += 1;
			self.metrics.alerts.with_label_values(&["sent"]).inc();
		}

		tracing::info!(
			channel = %destination.name,
			sent = report.sent,
			threaded = report.threaded,
			"dispatched {} alerts",
			webhook.batch.alerts.len()
		);

		Ok(report)
	}

	/// Try sending a resolved alert as reply to its firing message. Returns
	/// `false` if the alert still has to be sent on its own.
	async fn send_reply(
		&self,
		destination: &ChannelHandle,
		alert: &Alert,
		message: &OutboundMessage,
	) -> bool {
		let firing = match self
			.correlator
			.find_firing_message(self.session.as_ref(), &destination.id, &alert.fingerprint)
			.await
		{
			Ok(firing) => firing,
			Err(err @ CorrelationError::NotFound { .. }) => {
				tracing::info!(fingerprint = %alert.fingerprint, "{err}");
				return false;
			}
			Err(err) => {
				tracing::warn!(
					fingerprint = %alert.fingerprint,
					"error finding original firing message: {err}"
				);
				return false;
			}
		};

		match self.session.send_reply(&destination.id, message, &firing.id).await {
			Ok(_) => true,
			Err(err) => {
				// still send the resolved alert, just without the reference
				tracing::error!(
					channel = %destination.name,
					"error sending resolved alert as reply: {err}"
				);
				false
			}
		}
	}

	/// post a diagnostic message into the info channel, failures are only
	/// logged
	async fn notify_info(&self, routes: &ChannelRoutes, text: &str) {
		let Some(info) = routes.get(&self.options.info_channel_key) else {
			tracing::error!(route = %self.options.info_channel_key, "no route found for info channel");
			return;
		};

		if let Err(err) = self.session.send_text(&info.id, text).await {
			tracing::error!("error sending info message: {err}");
		}
	}
}
