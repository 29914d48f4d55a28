//! Finds the message of a firing alert so its resolved notification can be
//! sent as a reply.
//!
//! There is no index of sent messages. Instead the most recent messages of
//! the channel are scanned for an alert message carrying the same
//! fingerprint. This is a heuristic: messages older than the scanned page
//! are never found, in which case the resolved alert is sent unthreaded.

use serde::Deserialize;
use thiserror::Error;

use crate::{
	alert::STATUS_FIRING,
	discord::{model::Message, ChatSession, SessionError},
	message_renderer::FINGERPRINT_FIELD,
};

/// discord doesn't return more than 100 messages per request
pub const MAX_HISTORY_LIMIT: u8 = 100;

#[derive(Error, Debug)]
pub enum CorrelationError {
	/// no firing message with this fingerprint in the scanned history
	#[error("no firing message with fingerprint {fingerprint:?} in the last {scanned} messages")]
	NotFound { fingerprint: String, scanned: usize },
	/// the channel history couldn't be fetched
	#[error("failed to fetch channel history: {0}")]
	History(#[from] SessionError),
}

/// how messages in the history are recognized as firing alert messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
	/// an embed title contains "firing" (ignoring case)
	#[default]
	EmbedTitle,
	/// the message was sent by the bot itself
	Author,
	/// both of the above
	Both,
}

impl MatchPolicy {
	/// checks if `message` is a candidate for correlation
	fn is_candidate(self, message: &Message, bot_id: &str) -> bool {
		let firing_title = || {
			message.embeds.iter().filter_map(|embed| embed.title.as_deref()).any(|title| {
				title.to_lowercase().contains(STATUS_FIRING)
			})
		};
		let own_message = || message.author.id == bot_id;

		match self {
			Self::EmbedTitle => firing_title(),
			Self::Author => own_message(),
			Self::Both => own_message() && firing_title(),
		}
	}
}

/// checks if one of the embeds of `message` carries `fingerprint`
fn has_fingerprint(message: &Message, fingerprint: &str) -> bool {
	message
		.embeds
		.iter()
		.flat_map(|embed| embed.fields.iter())
		.any(|field| field.name == FINGERPRINT_FIELD && field.value == fingerprint)
}

/// scans channel history for firing alert messages
#[derive(Debug, Clone)]
pub struct Correlator {
	policy: MatchPolicy,
	history_limit: u8,
	/// user id of the bot, used by [MatchPolicy::Author]
	bot_id: String,
}

impl Correlator {
	/// # Arguments
	///
	/// * `policy` - how candidate messages are recognized
	///
	/// * `history_limit` - number of recent messages to scan, capped at [MAX_HISTORY_LIMIT]
	///
	/// * `bot_id` - user id of the bot
	pub fn new(policy: MatchPolicy, history_limit: u8, bot_id: String) -> Self {
		Self { policy, history_limit: history_limit.min(MAX_HISTORY_LIMIT), bot_id }
	}

	/// Find the most recent firing message in `channel_id` carrying
	/// `fingerprint`.
	pub async fn find_firing_message(
		&self,
		session: &dyn ChatSession,
		channel_id: &str,
		fingerprint: &str,
	) -> Result<Message, CorrelationError> {
		if fingerprint.is_empty() {
			return Err(CorrelationError::NotFound { fingerprint: String::new(), scanned: 0 });
		}

		let messages = session.recent_messages(channel_id, self.history_limit).await?;
		let scanned = messages.len();

		messages
			.into_iter()
			.filter(|message| self.policy.is_candidate(message, &self.bot_id))
			.find(|message| has_fingerprint(message, fingerprint))
			.ok_or_else(|| CorrelationError::NotFound { fingerprint: fingerprint.to_owned(), scanned })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::discord::{
		model::{Embed, EmbedField},
		testing::{MockSession, BOT_ID},
	};

	fn embed(title: &str, fingerprint: &str) -> Embed {
		Embed {
			title: Some(title.to_owned()),
			fields: vec![
				EmbedField { name: "alertname".to_owned(), value: "HighCPU".to_owned(), inline: true },
				EmbedField {
					name: FINGERPRINT_FIELD.to_owned(),
					value: fingerprint.to_owned(),
					inline: true,
				},
			],
			..Default::default()
		}
	}

	fn correlator(policy: MatchPolicy) -> Correlator {
		Correlator::new(policy, 100, BOT_ID.to_owned())
	}

	#[tokio::test]
	async fn finds_most_recent_firing_message() {
		let session = MockSession::new();
		session.add_history("10", BOT_ID, embed("HighCPU - (FIRING)", "abc123"));
		let newest = session.add_history("10", BOT_ID, embed("HighCPU - (FIRING)", "abc123"));
		session.add_history("10", BOT_ID, embed("HighCPU - (FIRING)", "other"));

		let found = correlator(MatchPolicy::EmbedTitle)
			.find_firing_message(&session, "10", "abc123")
			.await
			.unwrap();

		assert_eq!(found.id, newest);
	}

	#[tokio::test]
	async fn resolved_messages_are_not_candidates() {
		let session = MockSession::new();
		session.add_history("10", BOT_ID, embed("HighCPU - (RESOLVED)", "abc123"));

		let err = correlator(MatchPolicy::EmbedTitle)
			.find_firing_message(&session, "10", "abc123")
			.await
			.unwrap_err();

		assert!(matches!(err, CorrelationError::NotFound { scanned: 1, .. }));
	}

	#[tokio::test]
	async fn other_channels_are_ignored() {
		let session = MockSession::new();
		session.add_history("11", BOT_ID, embed("HighCPU - (FIRING)", "abc123"));

		let result =
			correlator(MatchPolicy::EmbedTitle).find_firing_message(&session, "10", "abc123").await;

		assert!(matches!(result, Err(CorrelationError::NotFound { scanned: 0, .. })));
	}

	#[tokio::test]
	async fn fingerprint_field_name_must_match_exactly() {
		let session = MockSession::new();
		let mut embed = embed("HighCPU - (FIRING)", "abc123");
		embed.fields[1].name = "fingerprint".to_owned();
		session.add_history("10", BOT_ID, embed);

		let result =
			correlator(MatchPolicy::EmbedTitle).find_firing_message(&session, "10", "abc123").await;

		assert!(matches!(result, Err(CorrelationError::NotFound { .. })));
	}

	#[tokio::test]
	async fn policies() {
		let session = MockSession::new();
		let foreign = session.add_history("10", "1234", embed("HighCPU - (firing)", "abc123"));
		let untitled = session.add_history("10", BOT_ID, embed("HighCPU", "abc123"));

		let by_title =
			correlator(MatchPolicy::EmbedTitle).find_firing_message(&session, "10", "abc123").await;
		let by_author =
			correlator(MatchPolicy::Author).find_firing_message(&session, "10", "abc123").await;
		let by_both = correlator(MatchPolicy::Both).find_firing_message(&session, "10", "abc123").await;

		assert_eq!(by_title.unwrap().id, foreign);
		assert_eq!(by_author.unwrap().id, untitled);
		assert!(matches!(by_both, Err(CorrelationError::NotFound { .. })));
	}

	#[tokio::test]
	async fn history_window_is_bounded() {
		let session = MockSession::new();
		session.add_history("10", BOT_ID, embed("HighCPU - (FIRING)", "abc123"));
		for _ in 0..3 {
			session.add_history("10", BOT_ID, embed("Other - (FIRING)", "zzz"));
		}

		let result = Correlator::new(MatchPolicy::EmbedTitle, 3, BOT_ID.to_owned())
			.find_firing_message(&session, "10", "abc123")
			.await;

		assert!(matches!(result, Err(CorrelationError::NotFound { scanned: 3, .. })));
	}

	#[tokio::test]
	async fn empty_fingerprint_never_matches() {
		let session = MockSession::new();
		session.add_history("10", BOT_ID, embed("HighCPU - (FIRING)", ""));

		let result = correlator(MatchPolicy::EmbedTitle).find_firing_message(&session, "10", "").await;

		assert!(matches!(result, Err(CorrelationError::NotFound { scanned: 0, .. })));
	}

	#[tokio::test]
	async fn history_failure() {
		let session = MockSession::new();
		session.fail_history();

		let result =
			correlator(MatchPolicy::EmbedTitle).find_firing_message(&session, "10", "abc123").await;

		assert!(matches!(result, Err(CorrelationError::History(_))));
	}

	#[test]
	fn policy_from_config() {
		let policy: MatchPolicy = serde_json::from_str(r#""embed_title""#).unwrap();
		assert_eq!(policy, MatchPolicy::EmbedTitle);

		let policy: MatchPolicy = serde_json::from_str(r#""both""#).unwrap();
		assert_eq!(policy, MatchPolicy::Both);
	}
}
