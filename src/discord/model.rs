//! data structures exchanged with the discord api
//!
//! Only the parts of the discord objects that hobbyist reads or writes are
//! modelled. Unknown fields are ignored when deserializing.

use serde::{Deserialize, Serialize};

/// a guild (community) the bot is a member of
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Guild {
	pub id: String,
	#[serde(default)]
	pub name: String,
}

/// discord channel types we care about, everything else is kept as raw value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "u8")]
pub enum ChannelKind {
	/// `GUILD_TEXT`
	Text,
	/// `GUILD_CATEGORY`
	Category,
	/// voice, forum, announcement, ...
	Other(u8),
}

impl From<u8> for ChannelKind {
	fn from(kind: u8) -> Self {
		match kind {
			0 => Self::Text,
			4 => Self::Category,
			other => Self::Other(other),
		}
	}
}

/// a channel as returned by the guild channel listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
	pub id: String,
	#[serde(rename = "type")]
	pub kind: ChannelKind,
	#[serde(default)]
	pub name: String,
	/// id of the category this channel is nested in
	#[serde(default)]
	pub parent_id: Option<String>,
}

/// author of a message
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MessageAuthor {
	pub id: String,
}

/// a message read from or sent into a channel
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
	pub id: String,
	#[serde(default)]
	pub author: MessageAuthor,
	#[serde(default)]
	pub embeds: Vec<Embed>,
}

/// Rich embed. Used for outgoing messages as well as for inspecting the
/// embeds of messages in the channel history.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Embed {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub color: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub footer: Option<EmbedFooter>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub image: Option<EmbedImage>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmbedFooter {
	pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmbedImage {
	#[serde(default)]
	pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmbedField {
	pub name: String,
	pub value: String,
	#[serde(default)]
	pub inline: bool,
}
