//! http endpoint receiving grafana's discord webhooks
//!
//! `POST /channels/:group/:channel` with the webhook body in the multipart
//! form field `payload_json`.
use std::{
	net::{IpAddr, SocketAddr},
	sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
	extract::{multipart::MultipartRejection, Extension, Multipart, Path},
	http::StatusCode,
	routing::post,
	Router,
};
use bytes::Bytes;
use serde::Deserialize;

use crate::{dispatcher::Dispatcher, settings::Settings};

/// name of the form field carrying the webhook body
const PAYLOAD_FIELD: &str = "payload_json";

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookReceiverSettings {
	pub bind_address: IpAddr,
	pub port: u16,
}

impl WebhookReceiverSettings {
	pub fn global() -> &'static Self {
		&Settings::global().webhook_receiver
	}

	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

/// Read the `payload_json` field. A missing field yields an empty body,
/// which the dispatcher reports as invalid payload.
async fn payload(mut multipart: Multipart) -> Result<Bytes, (StatusCode, String)> {
	while let Some(field) = multipart.next_field().await.map_err(internal_error)? {
		if field.name() == Some(PAYLOAD_FIELD) {
			return field.bytes().await.map_err(internal_error);
		}
	}

	Ok(Bytes::new())
}

fn internal_error(err: impl std::fmt::Display) -> (StatusCode, String) {
	(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

async fn channel_receiver(
	Extension(dispatcher): Extension<Arc<Dispatcher>>,
	Path((group, channel)): Path<(String, String)>,
	multipart: Result<Multipart, MultipartRejection>,
) -> Result<StatusCode, (StatusCode, String)> {
	let multipart = multipart.map_err(|err| {
		tracing::debug!("error parsing multipart form: {err}");
		internal_error("error parsing multipart form")
	})?;

	let body = payload(multipart).await?;

	match dispatcher.dispatch(&group, &channel, &body).await {
		Ok(_) => Ok(StatusCode::OK),
		Err(err) => {
			tracing::error!(group = %group, channel = %channel, "error handling channel request: {err}");
			Err(internal_error(err))
		}
	}
}

/// routes of the webhook receiver
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
	Router::new()
		.route("/channels/:group/:channel", post(channel_receiver))
		.layer(Extension(dispatcher))
}

pub async fn run_webhook_receiver(dispatcher: Arc<Dispatcher>) -> Result<()> {
	let addr = WebhookReceiverSettings::global().to_socket_addr();

	tracing::info!("starting webhook receiver on {addr}");

	axum::Server::bind(&addr)
		.serve(router(dispatcher).into_make_service())
		.await
		.context("webhook receiver crashed")?;

	Ok(())
}
