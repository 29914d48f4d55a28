//! grafana/alertmanager webhook receiver that forwards alerts into discord channels
//!
//! Features:
//! - forwards different webhook url paths (`/channels/<category>/<channel>`) into different discord channels
//! - resolved alerts are posted as reply to the message of the firing alert
//! - diagnostic messages about misconfigured webhooks in a dedicated info channel

use std::sync::Arc;

use anyhow::{Context, Result};
use correlation::Correlator;
use discord::http_client::DiscordClient;
use dispatcher::{DispatchOptions, Dispatcher};
use settings::Settings;

mod alert;
mod correlation;
mod discord;
mod dispatcher;
mod log;
mod message_renderer;
mod outbound_message;
mod routes;
mod settings;
mod telemetry_endpoint;
mod webhook_payload;
mod webhook_receiver;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// resolves once the process is asked to stop
async fn shutdown_signal() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{signal, SignalKind};

		match signal(SignalKind::terminate()) {
			Ok(mut terminate) => {
				tokio::select! {
					_ = tokio::signal::ctrl_c() => {},
					_ = terminate.recv() => {},
				}
				return;
			}
			Err(err) => tracing::warn!("can't listen for SIGTERM: {err}"),
		}
	}

	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::warn!("can't listen for ctrl-c: {err}");
		std::future::pending::<()>().await;
	}
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	log::setup_logging().context("could not setup logging")?;

	let settings = Settings::global();
	let registry = prometheus::default_registry();

	let session = DiscordClient::new(&settings.discord, registry)
		.context("failed to construct discord client")?;

	let correlator = Correlator::new(
		settings.correlation.match_policy,
		settings.correlation.history_limit,
		settings.discord.application_id.clone(),
	);

	let dispatcher = Dispatcher::new(
		Arc::new(session),
		correlator,
		DispatchOptions {
			info_channel_key: settings.info_channel_key.clone(),
			guild_id: settings.discord.guild_id.clone(),
		},
		registry,
	)
	.context("failed to register dispatcher metrics")?;

	tracing::info!("hobbyist is running, press ctrl-c to exit");

	tokio::select! {
		result = webhook_receiver::run_webhook_receiver(Arc::new(dispatcher)) => {
			result.context("webhook receiver failed to start or crashed")?;
		}
		result = telemetry_endpoint::run_telemetry_endpoint() => {
			result.context("telemetry endpoint failed to start or crashed")?;
		}
		_ = shutdown_signal() => {
			tracing::info!("stopping hobbyist");
		}
	}

	Ok(())
}
