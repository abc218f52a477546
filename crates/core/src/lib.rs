pub mod config;
pub mod domain;
pub mod trigger;

pub use domain::channel::{Channel, ChannelId, ChannelIgnoreSet};
pub use domain::post::{NewPost, Post, PostId};
pub use domain::team::{Team, TeamId};
pub use domain::user::{User, UserId};
pub use trigger::{PingTrigger, REPLY_BODY};
