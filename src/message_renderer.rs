//! Renders alerts into discord messages.
//!
//! Alerts are received from [dispatcher](crate::dispatcher), rendered
//! messages are sent by the [ChatSession](crate::discord::ChatSession).

use chrono::{DateTime, Datelike};

use crate::{
	alert::Alert,
	discord::model::{Embed, EmbedField, EmbedFooter, EmbedImage},
	outbound_message::{
		inline_field, truncated, LinkButton, OutboundMessage, MAX_DESCRIPTION_LEN, MAX_FIELDS,
		MAX_FIELD_VALUE_LEN, MAX_FOOTER_LEN, MAX_TITLE_LEN,
	},
};

/// embed color of firing alerts
pub const COLOR_FIRING: u32 = 0xED4245;
/// embed color of everything that isn't firing
pub const COLOR_RESOLVED: u32 = 0x57F287;

/// name of the embed field carrying the alert fingerprint
pub const FINGERPRINT_FIELD: &str = "Fingerprint";

/// Render alert into a message.
///
/// The output only depends on `alert` and `image`.
///
/// # Arguments
///
/// * `alert` - the alert to render
///
/// * `image` - preview image of the webhook envelope
pub fn render(alert: &Alert, image: Option<&str>) -> OutboundMessage {
	let color = if alert.is_firing() { COLOR_FIRING } else { COLOR_RESOLVED };

	let title = format!("{} - ({})", alert.name(), alert.status.to_uppercase());

	let description = alert
		.annotations
		.get("description")
		.filter(|description| !description.is_empty())
		.map(|description| truncated(description.clone(), MAX_DESCRIPTION_LEN));

	let footer = (!alert.value_string.is_empty())
		.then(|| EmbedFooter { text: truncated(alert.value_string.clone(), MAX_FOOTER_LEN) });

	let embed = Embed {
		title: Some(truncated(title, MAX_TITLE_LEN)),
		description,
		color: Some(color),
		timestamp: timestamp(&alert.starts_at),
		footer,
		image: image.map(|url| EmbedImage { url: url.to_owned() }),
		fields: fields(alert),
	};

	OutboundMessage { embed, buttons: buttons(alert) }
}

/// One inline field per label. The fingerprint is appended as its own field
/// so that resolved alerts can find the message again, it's kept even if
/// labels have to be dropped to stay within discord's field limit. A label
/// named like the fingerprint field is left out.
fn fields(alert: &Alert) -> Vec<EmbedField> {
	let fingerprint = fingerprint_field(alert);
	let label_capacity = if fingerprint.is_some() { MAX_FIELDS - 1 } else { MAX_FIELDS };

	let mut fields: Vec<_> = alert
		.labels
		.iter()
		.filter(|(name, _)| {
			let collides = name.as_str() == FINGERPRINT_FIELD;
			if collides {
				tracing::debug!(alert = %alert.name(), "skipping label named {FINGERPRINT_FIELD}");
			}
			!collides
		})
		.take(label_capacity)
		.map(|(name, value)| inline_field(name, value))
		.collect();

	fields.extend(fingerprint);

	fields
}

/// The fingerprint has to survive unchanged for correlation. Fingerprints
/// that don't fit into a field are left out instead of being truncated.
fn fingerprint_field(alert: &Alert) -> Option<EmbedField> {
	if alert.fingerprint.is_empty() {
		return None;
	}

	if alert.fingerprint.chars().count() > MAX_FIELD_VALUE_LEN {
		tracing::warn!(
			alert = %alert.name(),
			"fingerprint exceeds {MAX_FIELD_VALUE_LEN} characters, resolved alert can't be threaded"
		);
		return None;
	}

	Some(EmbedField { name: FINGERPRINT_FIELD.to_owned(), value: alert.fingerprint.clone(), inline: true })
}

/// link buttons in the order Silence, Dashboard, Panel, Alert
fn buttons(alert: &Alert) -> Vec<LinkButton> {
	[
		("Silence", &alert.silence_url),
		("Dashboard", &alert.dashboard_url),
		("Panel", &alert.panel_url),
		("Alert", &alert.generator_url),
	]
	.into_iter()
	.filter(|(_, url)| !url.is_empty())
	.map(|(label, url)| LinkButton { label: label.to_owned(), url: url.clone() })
	.collect()
}

/// grafana sends `0001-01-01T00:00:00Z` for unset times
fn timestamp(starts_at: &str) -> Option<String> {
	DateTime::parse_from_rfc3339(starts_at)
		.ok()
		.filter(|time| time.year() > 1)
		.map(|time| time.to_rfc3339())
}
