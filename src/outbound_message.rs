//! Structured messages produced by the
//! [MessageRenderer](crate::message_renderer) and handed to the
//! [ChatSession](crate::discord::ChatSession). Discord rejects embeds that
//! exceed its size limits, so content is truncated here before sending.

use serde::Serialize;

use crate::discord::model::{Embed, EmbedField};

/// size limit of an embed title in characters
pub const MAX_TITLE_LEN: usize = 256;
/// size limit of an embed description in characters
pub const MAX_DESCRIPTION_LEN: usize = 4096;
/// size limit of an embed field name in characters
pub const MAX_FIELD_NAME_LEN: usize = 256;
/// size limit of an embed field value in characters
pub const MAX_FIELD_VALUE_LEN: usize = 1024;
/// size limit of an embed footer in characters
pub const MAX_FOOTER_LEN: usize = 2048;
/// maximum number of fields per embed
pub const MAX_FIELDS: usize = 25;

/// discord refuses fields with empty values
const EMPTY_FIELD_VALUE: &str = "\u{200b}";

/// discord component type of an action row
const COMPONENT_ACTION_ROW: u8 = 1;
/// discord component type of a button
const COMPONENT_BUTTON: u8 = 2;
/// discord button style `Link`
const BUTTON_STYLE_LINK: u8 = 5;

/// A button that opens an url
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
	pub label: String,
	pub url: String,
}

/// A rendered alert: one embed plus an optional row of link buttons
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage {
	pub embed: Embed,
	pub buttons: Vec<LinkButton>,
}

impl OutboundMessage {
	/// The json body for discord's create message endpoint.
	///
	/// # Arguments
	///
	/// * `reply_to` - id of the message this message replies to
	pub fn payload<'a>(&'a self, reply_to: Option<&'a str>) -> MessagePayload<'a> {
		let components = if self.buttons.is_empty() {
			Vec::new()
		} else {
			vec![ActionRow {
				kind: COMPONENT_ACTION_ROW,
				components: self
					.buttons
					.iter()
					.map(|button| Button {
						kind: COMPONENT_BUTTON,
						style: BUTTON_STYLE_LINK,
						label: &button.label,
						url: &button.url,
					})
					.collect(),
			}]
		};

		MessagePayload {
			content: None,
			embeds: vec![&self.embed],
			components,
			message_reference: reply_to
				.map(|message_id| MessageReference { message_id, fail_if_not_exists: false }),
		}
	}

	/// The json body for a plain text message
	pub fn text_payload(text: &str) -> MessagePayload<'_> {
		MessagePayload {
			content: Some(text),
			embeds: Vec::new(),
			components: Vec::new(),
			message_reference: None,
		}
	}
}

#[derive(Debug, Serialize)]
pub struct MessagePayload<'a> {
	#[serde(skip_serializing_if = "Option::is_none")]
	content: Option<&'a str>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	embeds: Vec<&'a Embed>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	components: Vec<ActionRow<'a>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	message_reference: Option<MessageReference<'a>>,
}

#[derive(Debug, Serialize)]
struct ActionRow<'a> {
	#[serde(rename = "type")]
	kind: u8,
	components: Vec<Button<'a>>,
}

#[derive(Debug, Serialize)]
struct Button<'a> {
	#[serde(rename = "type")]
	kind: u8,
	style: u8,
	label: &'a str,
	url: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageReference<'a> {
	message_id: &'a str,
	fail_if_not_exists: bool,
}

/// truncate string to at most `max` characters, marking the cut with an
/// ellipsis
pub fn truncated(mut text: String, max: usize) -> String {
	if text.chars().nth(max).is_some() {
		let keep = text.char_indices().nth(max.saturating_sub(1)).map_or(0, |(index, _)| index);
		text.truncate(keep);
		text.push('…');
	}

	text
}

/// construct an inline field obeying the size limits of discord
pub fn inline_field(name: &str, value: &str) -> EmbedField {
	let value = if value.is_empty() { EMPTY_FIELD_VALUE.to_owned() } else { value.to_owned() };

	EmbedField {
		name: truncated(name.to_owned(), MAX_FIELD_NAME_LEN),
		value: truncated(value, MAX_FIELD_VALUE_LEN),
		inline: true,
	}
}
