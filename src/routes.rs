//! Maps webhook url paths to discord channels.
//!
//! A text channel `alerts` inside the category `Infra` is reachable as
//! `/infra/alerts`. The table is rebuilt from the live channel listing for
//! every request so renamed or moved channels are picked up immediately.

use std::collections::HashMap;

use thiserror::Error;

use crate::discord::{model::ChannelKind, ChatSession, SessionError};

/// the channel listing couldn't be fetched
#[derive(Error, Debug)]
#[error("failed to fetch channel listing: {0}")]
pub struct RouteFetchError(#[from] pub SessionError);

/// build the case insensitive route key for a group (category) and channel
pub fn route_key(group: &str, channel: &str) -> String {
	format!("/{}/{}", group.to_lowercase(), channel.to_lowercase())
}

/// destination of a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
	pub id: String,
	pub name: String,
}

/// route key to channel mapping
#[derive(Debug, Clone, Default)]
pub struct ChannelRoutes {
	routes: HashMap<String, ChannelHandle>,
}

impl ChannelRoutes {
	/// Build the routing table from all guilds of the bot.
	///
	/// # Arguments
	///
	/// * `session` - the chat session used to list guilds and channels
	///
	/// * `guild_id` - if set only channels of this guild are routable
	pub async fn build(
		session: &dyn ChatSession,
		guild_id: Option<&str>,
	) -> Result<Self, RouteFetchError> {
		let mut routes = HashMap::new();

		for guild in session.guilds().await? {
			if matches!(guild_id, Some(id) if id != guild.id) {
				continue;
			}

			let channels = session.guild_channels(&guild.id).await?;
			tracing::debug!(guild = %guild.name, "found {} channels", channels.len());

			let groups: HashMap<&str, &str> = channels
				.iter()
				.filter(|channel| channel.kind == ChannelKind::Category)
				.map(|channel| (channel.id.as_str(), channel.name.as_str()))
				.collect();

			for channel in channels.iter().filter(|channel| channel.kind == ChannelKind::Text) {
				// only text channels nested in a category are routable
				let Some(group) = channel.parent_id.as_deref().and_then(|id| groups.get(id)) else {
					continue;
				};

				let key = route_key(group, &channel.name);
				if let Some(previous) = routes.insert(
					key.clone(),
					ChannelHandle { id: channel.id.clone(), name: channel.name.clone() },
				) {
					tracing::debug!(route = %key, shadowed = %previous.id, "duplicate route");
				}
			}
		}

		tracing::debug!("built {} channel routes", routes.len());

		Ok(Self { routes })
	}

	/// look up the channel for an already formed route key
	pub fn get(&self, key: &str) -> Option<&ChannelHandle> {
		self.routes.get(key)
	}

	/// look up the channel of a group and channel name, ignoring case
	pub fn resolve(&self, group: &str, channel: &str) -> Option<&ChannelHandle> {
		self.get(&route_key(group, channel))
	}
}
