use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Name of the channel every team member belongs to. It is noisy, so the bot
/// mutes it unless the monitor flag asks otherwise.
pub const DEFAULT_CHANNEL_NAME: &str = "town-square";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// Channels the bot deliberately does not act on. Built once during bootstrap
/// and immutable afterwards; membership is exact id equality.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelIgnoreSet {
    ids: HashSet<ChannelId>,
}

impl ChannelIgnoreSet {
    pub fn from_channels(channels: &[Channel], monitor_town_square: bool) -> Self {
        let ids = channels
            .iter()
            .filter(|channel| channel.name == DEFAULT_CHANNEL_NAME && !monitor_town_square)
            .map(|channel| channel.id.clone())
            .collect();
        Self { ids }
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Channel, ChannelId, ChannelIgnoreSet, DEFAULT_CHANNEL_NAME};

    fn channel(id: &str, name: &str) -> Channel {
        Channel {
            id: ChannelId(id.to_string()),
            name: name.to_string(),
            display_name: name.to_string(),
        }
    }

    #[test]
    fn town_square_is_ignored_when_monitor_flag_is_off() {
        let channels = [channel("c1", DEFAULT_CHANNEL_NAME), channel("c2", "general")];

        let ignored = ChannelIgnoreSet::from_channels(&channels, false);

        assert!(ignored.contains(&ChannelId("c1".to_string())));
        assert!(!ignored.contains(&ChannelId("c2".to_string())));
        assert_eq!(ignored.len(), 1);
    }

    #[test]
    fn town_square_is_monitored_when_flag_is_on() {
        let channels = [channel("c1", DEFAULT_CHANNEL_NAME), channel("c2", "general")];

        let ignored = ChannelIgnoreSet::from_channels(&channels, true);

        assert!(ignored.is_empty());
    }

    #[test]
    fn non_default_channels_are_never_ignored() {
        let channels = [channel("c2", "general"), channel("c3", "random")];

        let ignored = ChannelIgnoreSet::from_channels(&channels, false);

        assert!(ignored.is_empty());
    }
}
