//! The chat platform as seen by hobbyist.
//!
//! Everything the core needs from discord is expressed by [ChatSession]. The
//! production implementation talks to the discord REST api
//! ([http_client::DiscordClient]), tests use an in memory session.

use async_trait::async_trait;
use thiserror::Error;

use self::model::{Channel, Guild, Message};
use crate::outbound_message::OutboundMessage;

pub mod http_client;
pub mod model;
pub mod settings;

#[cfg(test)]
pub mod testing;

/// errors returned by a [ChatSession]
#[derive(Error, Debug)]
pub enum SessionError {
	/// request couldn't be sent or the response couldn't be read
	#[error("request to discord failed: {0}")]
	Http(#[from] reqwest::Error),
	/// discord answered with an error status
	#[error("discord returned {status}: {message}")]
	Api { status: u16, message: String },
	/// we've been ratelimited for longer than we're willing to wait
	#[error("ratelimited by discord on {route}")]
	RateLimited { route: String },
}

/// Operations on the chat platform used by the dispatcher.
///
/// Implementations must be safe to share between concurrently handled
/// webhook requests. Cancellation is inherited from the caller: dropping the
/// returned future aborts the request.
#[async_trait]
pub trait ChatSession: Send + Sync {
	/// guilds the bot is a member of
	async fn guilds(&self) -> Result<Vec<Guild>, SessionError>;

	/// all channels (including categories) of a guild
	async fn guild_channels(&self, guild_id: &str) -> Result<Vec<Channel>, SessionError>;

	/// send a rendered alert into a channel
	async fn send_message(
		&self,
		channel_id: &str,
		message: &OutboundMessage,
	) -> Result<Message, SessionError>;

	/// send a rendered alert as a reply to `reply_to`
	async fn send_reply(
		&self,
		channel_id: &str,
		message: &OutboundMessage,
		reply_to: &str,
	) -> Result<Message, SessionError>;

	/// up to `limit` of the most recent messages of a channel, newest first
	async fn recent_messages(
		&self,
		channel_id: &str,
		limit: u8,
	) -> Result<Vec<Message>, SessionError>;

	/// send a plain text message
	async fn send_text(&self, channel_id: &str, text: &str) -> Result<Message, SessionError>;
}
