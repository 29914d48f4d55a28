//! in memory [ChatSession] for tests

use std::sync::Mutex;

use async_trait::async_trait;

use super::{
	model::{Channel, ChannelKind, Embed, Guild, Message, MessageAuthor},
	ChatSession, SessionError,
};
use crate::outbound_message::OutboundMessage;

/// user id of the bot operating the mock session
pub const BOT_ID: &str = "99";

/// a message the mock session was asked to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
	pub channel_id: String,
	pub message_id: String,
	pub embed: Option<Embed>,
	pub text: Option<String>,
	pub reply_to: Option<String>,
}

#[derive(Debug, Default)]
struct State {
	guilds: Vec<Guild>,
	channels: Vec<(String, Channel)>,
	/// channel id and message, oldest first
	history: Vec<(String, Message)>,
	sent: Vec<Sent>,
	next_id: u64,
	fail_listing: bool,
	fail_history: bool,
	fail_replies: bool,
	/// fail every send into this channel after this many successful sends
	fail_sends_after: Option<(String, usize)>,
}

/// Guilds, channels and history live in memory. Sent messages are appended
/// to the history so later correlation sees them.
#[derive(Debug, Default)]
pub struct MockSession {
	state: Mutex<State>,
}

fn api_error(message: &str) -> SessionError {
	SessionError::Api { status: 500, message: message.to_owned() }
}

impl MockSession {
	pub fn new() -> Self {
		Self::default()
	}

	/// Session with one guild containing the categories `Infra` and `Ops`,
	/// the text channels `Infra/alerts` (id `10`) and `Ops/info` (id `20`),
	/// a top level text channel `general` and a voice channel `Infra/voice`.
	pub fn with_default_guild() -> Self {
		let session = Self::new();
		session.add_guild("1", "ops-community");
		session.add_channel("1", "100", ChannelKind::Category, "Infra", None);
		session.add_channel("1", "200", ChannelKind::Category, "Ops", None);
		session.add_channel("1", "10", ChannelKind::Text, "alerts", Some("100"));
		session.add_channel("1", "20", ChannelKind::Text, "info", Some("200"));
		session.add_channel("1", "30", ChannelKind::Text, "general", None);
		session.add_channel("1", "40", ChannelKind::Other(2), "voice", Some("100"));
		session
	}

	pub fn add_guild(&self, id: &str, name: &str) {
		self.lock().guilds.push(Guild { id: id.to_owned(), name: name.to_owned() });
	}

	pub fn add_channel(
		&self,
		guild_id: &str,
		id: &str,
		kind: ChannelKind,
		name: &str,
		parent_id: Option<&str>,
	) {
		self.lock().channels.push((
			guild_id.to_owned(),
			Channel {
				id: id.to_owned(),
				kind,
				name: name.to_owned(),
				parent_id: parent_id.map(str::to_owned),
			},
		));
	}

	/// put a message into the history of a channel
	pub fn add_history(&self, channel_id: &str, author_id: &str, embed: Embed) -> String {
		let mut state = self.lock();
		let id = state.allocate_id();
		state.history.push((
			channel_id.to_owned(),
			Message {
				id: id.clone(),
				author: MessageAuthor { id: author_id.to_owned() },
				embeds: vec![embed],
			},
		));
		id
	}

	pub fn sent(&self) -> Vec<Sent> {
		self.lock().sent.clone()
	}

	pub fn fail_listing(&self) {
		self.lock().fail_listing = true;
	}

	pub fn fail_history(&self) {
		self.lock().fail_history = true;
	}

	pub fn fail_replies(&self) {
		self.lock().fail_replies = true;
	}

	pub fn fail_sends_after(&self, channel_id: &str, successful: usize) {
		self.lock().fail_sends_after = Some((channel_id.to_owned(), successful));
	}

	#[allow(clippy::unwrap_used)]
	fn lock(&self) -> std::sync::MutexGuard<'_, State> {
		self.state.lock().unwrap()
	}
}

impl State {
	fn allocate_id(&mut self) -> String {
		self.next_id += 1;
		self.next_id.to_string()
	}

	fn record(
		&mut self,
		channel_id: &str,
		embed: Option<Embed>,
		text: Option<String>,
		reply_to: Option<String>,
	) -> Result<Message, SessionError> {
		if let Some((channel, successful)) = &self.fail_sends_after {
			let already_sent = self.sent.iter().filter(|sent| &sent.channel_id == channel).count();
			if channel == channel_id && already_sent >= *successful {
				return Err(api_error("send failed"));
			}
		}

		let id = self.allocate_id();
		let message = Message {
			id: id.clone(),
			author: MessageAuthor { id: BOT_ID.to_owned() },
			embeds: embed.iter().cloned().collect(),
		};

		self.history.push((channel_id.to_owned(), message.clone()));
		self.sent.push(Sent {
			channel_id: channel_id.to_owned(),
			message_id: id,
			embed,
			text,
			reply_to,
		});

		Ok(message)
	}
}

#[async_trait]
impl ChatSession for MockSession {
	async fn guilds(&self) -> Result<Vec<Guild>, SessionError> {
		let state = self.lock();
		if state.fail_listing {
			return Err(api_error("listing failed"));
		}

		Ok(state.guilds.clone())
	}

	async fn guild_channels(&self, guild_id: &str) -> Result<Vec<Channel>, SessionError> {
		let state = self.lock();
		if state.fail_listing {
			return Err(api_error("listing failed"));
		}

		Ok(state
			.channels
			.iter()
			.filter(|(guild, _)| guild == guild_id)
			.map(|(_, channel)| channel.clone())
			.collect())
	}

	async fn send_message(
		&self,
		channel_id: &str,
		message: &OutboundMessage,
	) -> Result<Message, SessionError> {
		self.lock().record(channel_id, Some(message.embed.clone()), None, None)
	}

	async fn send_reply(
		&self,
		channel_id: &str,
		message: &OutboundMessage,
		reply_to: &str,
	) -> Result<Message, SessionError> {
		let mut state = self.lock();
		if state.fail_replies {
			return Err(api_error("reply failed"));
		}

		state.record(channel_id, Some(message.embed.clone()), None, Some(reply_to.to_owned()))
	}

	async fn recent_messages(
		&self,
		channel_id: &str,
		limit: u8,
	) -> Result<Vec<Message>, SessionError> {
		let state = self.lock();
		if state.fail_history {
			return Err(api_error("history unavailable"));
		}

		Ok(state
			.history
			.iter()
			.rev()
			.filter(|(channel, _)| channel == channel_id)
			.take(usize::from(limit))
			.map(|(_, message)| message.clone())
			.collect())
	}

	async fn send_text(&self, channel_id: &str, text: &str) -> Result<Message, SessionError> {
		self.lock().record(channel_id, None, Some(text.to_owned()), None)
	}
}
