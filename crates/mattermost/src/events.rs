use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use pongbot_core::Post;

/// The one event kind the bot acts on.
pub const POSTED_EVENT: &str = "posted";

/// Raw wire shape of a realtime frame. Protocol replies (auth acks, seq
/// responses) arrive with no `event` name.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct EventEnvelope {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Map<String, Value>,
    #[serde(default)]
    pub seq: i64,
}

impl EventEnvelope {
    pub fn is_event(&self) -> bool {
        !self.event.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    Posted(PostedEvent),
    Unsupported { event_type: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PostedEvent {
    pub post: Post,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServerEventType {
    Posted,
    Unsupported,
}

impl ServerEvent {
    pub fn event_type(&self) -> ServerEventType {
        match self {
            Self::Posted(_) => ServerEventType::Posted,
            Self::Unsupported { .. } => ServerEventType::Unsupported,
        }
    }

    /// Classify an envelope. A `posted` envelope whose payload carries no
    /// usable post yields `None`: the event is dropped with no further
    /// action.
    pub fn from_envelope(envelope: &EventEnvelope) -> Option<Self> {
        match envelope.event.as_str() {
            POSTED_EVENT => PostedEvent::from_data(&envelope.data).map(Self::Posted),
            other => Some(Self::Unsupported { event_type: other.to_owned() }),
        }
    }
}

impl PostedEvent {
    // The `post` field is a JSON document serialized into a string.
    fn from_data(data: &serde_json::Map<String, Value>) -> Option<Self> {
        let raw = data.get("post")?.as_str()?;
        let post = serde_json::from_str::<Post>(raw).ok()?;
        Some(Self { post })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    Replied,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("post handler failure: {0}")]
    Post(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ServerEventType;
    async fn handle(&self, event: &ServerEvent) -> Result<HandlerOutcome, HandlerError>;
}

/// Routes each event to the handler registered for its type; events with no
/// handler are ignored.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ServerEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(&self, event: &ServerEvent) -> Result<HandlerOutcome, DispatchError> {
        let Some(handler) = self.handlers.get(&event.event_type()) else {
            return Ok(HandlerOutcome::Ignored);
        };

        handler.handle(event).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use super::{
        EventDispatcher, EventEnvelope, EventHandler, HandlerError, HandlerOutcome, ServerEvent,
        ServerEventType, POSTED_EVENT,
    };

    fn posted_envelope(post_json: Value) -> EventEnvelope {
        let mut data = serde_json::Map::new();
        data.insert("post".to_string(), Value::String(post_json.to_string()));
        EventEnvelope { event: POSTED_EVENT.to_string(), data, seq: 1 }
    }

    #[test]
    fn classifies_a_posted_envelope_with_an_embedded_post() {
        let envelope = posted_envelope(json!({
            "id": "p1",
            "channel_id": "c1",
            "user_id": "u1",
            "message": "ping",
            "root_id": "",
        }));

        let event = ServerEvent::from_envelope(&envelope).expect("posted event");

        let ServerEvent::Posted(posted) = event else { panic!("expected posted event") };
        assert_eq!(posted.post.message, "ping");
        assert_eq!(posted.post.root_id, None);
    }

    #[test]
    fn drops_a_posted_envelope_without_a_post_payload() {
        let envelope =
            EventEnvelope { event: POSTED_EVENT.to_string(), data: serde_json::Map::new(), seq: 2 };

        assert_eq!(ServerEvent::from_envelope(&envelope), None);
    }

    #[test]
    fn drops_a_posted_envelope_with_a_malformed_post_payload() {
        let mut data = serde_json::Map::new();
        data.insert("post".to_string(), Value::String("{not json".to_string()));
        let envelope = EventEnvelope { event: POSTED_EVENT.to_string(), data, seq: 3 };

        assert_eq!(ServerEvent::from_envelope(&envelope), None);
    }

    #[test]
    fn classifies_unknown_event_types_as_unsupported() {
        let envelope = EventEnvelope {
            event: "typing".to_string(),
            data: serde_json::Map::new(),
            seq: 4,
        };

        let event = ServerEvent::from_envelope(&envelope).expect("unsupported event");

        assert_eq!(event, ServerEvent::Unsupported { event_type: "typing".to_string() });
        assert_eq!(event.event_type(), ServerEventType::Unsupported);
    }

    struct RecordingHandler {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        fn event_type(&self) -> ServerEventType {
            ServerEventType::Posted
        }

        async fn handle(&self, event: &ServerEvent) -> Result<HandlerOutcome, HandlerError> {
            let ServerEvent::Posted(posted) = event else { return Ok(HandlerOutcome::Ignored) };
            self.seen.lock().await.push(posted.post.id.0.clone());
            Ok(HandlerOutcome::Replied)
        }
    }

    #[tokio::test]
    async fn dispatcher_routes_posted_events_to_the_registered_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(RecordingHandler { seen: Arc::clone(&seen) });

        let envelope = posted_envelope(json!({
            "id": "p1",
            "channel_id": "c1",
            "user_id": "u1",
            "message": "ping",
        }));
        let event = ServerEvent::from_envelope(&envelope).expect("posted event");

        let outcome = dispatcher.dispatch(&event).await.expect("dispatch");

        assert_eq!(outcome, HandlerOutcome::Replied);
        assert_eq!(seen.lock().await.as_slice(), ["p1"]);
    }

    #[tokio::test]
    async fn dispatcher_ignores_events_with_no_registered_handler() {
        let dispatcher = EventDispatcher::new();
        let event = ServerEvent::Unsupported { event_type: "typing".to_string() };

        let outcome = dispatcher.dispatch(&event).await.expect("dispatch");

        assert_eq!(outcome, HandlerOutcome::Ignored);
        assert_eq!(dispatcher.handler_count(), 0);
    }
}
