use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::channel::ChannelId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(pub String);

/// A message record parsed from an incoming event. The wire shape carries an
/// empty string where no thread root exists, so `root_id` normalizes that to
/// `None`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "empty_id_as_none")]
    pub root_id: Option<PostId>,
}

/// An outbound post, write-once: constructed, submitted, discarded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewPost {
    pub channel_id: ChannelId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_id: Option<PostId>,
}

impl NewPost {
    /// A reply in the same channel, threaded to the triggering post.
    pub fn reply_to(post: &Post, message: impl Into<String>) -> Self {
        Self {
            channel_id: post.channel_id.clone(),
            message: message.into(),
            root_id: Some(post.id.clone()),
        }
    }
}

fn empty_id_as_none<'de, D>(deserializer: D) -> Result<Option<PostId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|id| !id.is_empty()).map(PostId))
}
