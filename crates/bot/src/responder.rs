use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use pongbot_core::{NewPost, PingTrigger, REPLY_BODY};
use pongbot_mattermost::client::RestClient;
use pongbot_mattermost::events::{
    EventHandler, HandlerError, HandlerOutcome, ServerEvent, ServerEventType,
};

use crate::bootstrap::BotContext;

/// Replies "PONG", threaded, to whole-word "ping" posts in monitored
/// channels.
pub struct PingResponder {
    client: Arc<RestClient>,
    context: Arc<BotContext>,
    trigger: PingTrigger,
}

impl PingResponder {
    pub fn new(client: Arc<RestClient>, context: Arc<BotContext>) -> Self {
        Self { client, context, trigger: PingTrigger::new() }
    }
}

#[async_trait]
impl EventHandler for PingResponder {
    fn event_type(&self) -> ServerEventType {
        ServerEventType::Posted
    }

    async fn handle(&self, event: &ServerEvent) -> Result<HandlerOutcome, HandlerError> {
        let ServerEvent::Posted(posted) = event else { return Ok(HandlerOutcome::Ignored) };
        let post = &posted.post;

        // Never answer our own posts.
        if post.user_id == self.context.identity.id {
            return Ok(HandlerOutcome::Ignored);
        }
        if self.context.ignored.contains(&post.channel_id) {
            return Ok(HandlerOutcome::Ignored);
        }
        if !self.trigger.matches(&post.message) {
            return Ok(HandlerOutcome::Ignored);
        }

        let reply = NewPost::reply_to(post, REPLY_BODY);
        match self.client.create_post(&reply).await {
            Ok(created) => {
                info!(channel = %created.channel_id.0, post = %created.id.0, "replied");
                Ok(HandlerOutcome::Replied)
            }
            Err(error) => {
                // Log and continue; no retry.
                warn!(%error, "failed to send reply");
                Ok(HandlerOutcome::Ignored)
            }
        }
    }
}
