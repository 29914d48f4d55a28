//! data structures for deserializing incoming alerts
//!
//! Field names are accepted in the snake_case of the discord webhook template
//! as well as in the camelCase used by grafana and alertmanager.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// status of an alert that is currently firing
pub const STATUS_FIRING: &str = "firing";
/// status of an alert that stopped firing
pub const STATUS_RESOLVED: &str = "resolved";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
/// all alerts of one webhook request
pub struct AlertBatch {
	/// `firing` or `resolved`
	pub status: String,
	#[serde(default)]
	pub receiver: String,
	pub alerts: Vec<Alert>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
/// a single alert
pub struct Alert {
	pub status: String,
	pub labels: IndexMap<String, String>,
	pub annotations: IndexMap<String, String>,
	#[serde(alias = "startsAt")]
	pub starts_at: String,
	#[serde(alias = "endsAt")]
	pub ends_at: String,
	#[serde(alias = "generatorURL")]
	pub generator_url: String,
	#[serde(alias = "silenceURL")]
	pub silence_url: String,
	#[serde(alias = "dashboardURL")]
	pub dashboard_url: String,
	#[serde(alias = "panelURL")]
	pub panel_url: String,
	#[serde(alias = "valueString")]
	pub value_string: String,
	/// stable identifier of the alert across firing and resolved notifications
	pub fingerprint: String,
}

impl Alert {
	/// name of the alert rule, empty if the `alertname` label is missing
	pub fn name(&self) -> &str {
		self.labels.get("alertname").map_or("", String::as_str)
	}

	pub fn is_firing(&self) -> bool {
		self.status == STATUS_FIRING
	}

	pub fn is_resolved(&self) -> bool {
		self.status.eq_ignore_ascii_case(STATUS_RESOLVED)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
/// embed of the discord webhook envelope, only the image is of interest
pub struct WebhookEmbed {
	pub image: Option<WebhookImage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct WebhookImage {
	pub url: String,
}

/// a decoded webhook request: the alert batch plus the embeds of the envelope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Webhook {
	pub batch: AlertBatch,
	pub embeds: Vec<WebhookEmbed>,
}

impl Webhook {
	/// url of the first embed image of the envelope (grafana's panel preview)
	pub fn image_url(&self) -> Option<&str> {
		self.embeds
			.iter()
			.filter_map(|embed| embed.image.as_ref())
			.map(|image| image.url.as_str())
			.find(|url| !url.is_empty())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn camel_and_snake_case_fields() {
		let snake: Alert = serde_json::from_str(
			r#"{"status": "firing", "generator_url": "https://g", "value_string": "v", "fingerprint": "f"}"#,
		)
		.unwrap();
		let camel: Alert = serde_json::from_str(
			r#"{"status": "firing", "generatorURL": "https://g", "valueString": "v", "fingerprint": "f"}"#,
		)
		.unwrap();

		assert_eq!(snake, camel);
		assert_eq!(snake.generator_url, "https://g");
	}

	#[test]
	fn status_checks() {
		let mut alert = Alert { status: "firing".to_owned(), ..Default::default() };
		assert!(alert.is_firing());
		assert!(!alert.is_resolved());

		alert.status = "FIRING".to_owned();
		assert!(!alert.is_firing());

		alert.status = "Resolved".to_owned();
		assert!(alert.is_resolved());
	}

	#[test]
	fn first_non_empty_image() {
		let webhook = Webhook {
			batch: AlertBatch { status: "firing".to_owned(), receiver: String::new(), alerts: vec![] },
			embeds: vec![
				WebhookEmbed { image: None },
				WebhookEmbed { image: Some(WebhookImage { url: String::new() }) },
				WebhookEmbed { image: Some(WebhookImage { url: "https://img/1.png".to_owned() }) },
				WebhookEmbed { image: Some(WebhookImage { url: "https://img/2.png".to_owned() }) },
			],
		};

		assert_eq!(webhook.image_url(), Some("https://img/1.png"));
	}
}
