//! Decodes webhook request bodies into a [Webhook].
//!
//! Grafana's discord contact point posts a discord webhook envelope. Our
//! alert template puts the alert batch into its `content`, which arrives
//! either as json object or, for older templates, as a json string holding a
//! json document with trailing commas before closing brackets. Bare
//! grafana/alertmanager batches without envelope are accepted as well. All
//! variants go through the same normalization so the rest of hobbyist only
//! sees the canonical [AlertBatch].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::alert::{AlertBatch, Webhook, WebhookEmbed};

#[allow(clippy::expect_used)]
static TRAILING_COMMA: Lazy<Regex> =
	Lazy::new(|| Regex::new(r",\s*([\]}])").expect("trailing comma regex is valid"));

/// reasons a webhook body can't be decoded
#[derive(Error, Debug)]
pub enum ParseError {
	#[error("payload is not valid utf-8")]
	Encoding(#[from] std::str::Utf8Error),
	#[error("payload is not valid json: {0}")]
	Json(#[source] serde_json::Error),
	#[error("payload is not a json object")]
	NotAnObject,
	#[error("content of the payload is neither a json string nor a json object")]
	InvalidContent,
	#[error("embedded alert document is not valid json: {0}")]
	EmbeddedJson(#[source] serde_json::Error),
	#[error("payload doesn't describe an alert batch: {0}")]
	Schema(#[source] serde_json::Error),
}

/// remove commas directly preceding `]` or `}`
pub fn strip_trailing_commas(json: &str) -> std::borrow::Cow<'_, str> {
	TRAILING_COMMA.replace_all(json, "$1")
}

/// Decode a webhook request body.
///
/// Never panics, every malformed input results in a [ParseError].
pub fn parse(body: &[u8]) -> Result<Webhook, ParseError> {
	let body = std::str::from_utf8(body)?;

	let envelope: Value =
		serde_json::from_str(&strip_trailing_commas(body)).map_err(ParseError::Json)?;
	let Value::Object(mut envelope) = envelope else {
		return Err(ParseError::NotAnObject);
	};

	let embeds = take_embeds(&mut envelope);

	let document = match envelope.remove("content") {
		// string wrapped document, serde_json already unescaped it
		Some(Value::String(inner)) => serde_json::from_str(&strip_trailing_commas(&inner))
			.map_err(ParseError::EmbeddedJson)?,
		Some(document @ Value::Object(_)) => document,
		Some(_) => return Err(ParseError::InvalidContent),
		// no envelope, the body is the batch itself
		None => Value::Object(envelope),
	};

	let batch: AlertBatch = serde_json::from_value(document).map_err(ParseError::Schema)?;

	Ok(Webhook { batch, embeds })
}

/// Embeds are only used to find a preview image, so broken embeds are
/// ignored instead of failing the whole payload.
fn take_embeds(envelope: &mut Map<String, Value>) -> Vec<WebhookEmbed> {
	match envelope.remove("embeds") {
		Some(embeds) => serde_json::from_value(embeds).unwrap_or_else(|err| {
			tracing::debug!("ignoring malformed webhook embeds: {err}");
			Vec::new()
		}),
		None => Vec::new(),
	}
}
