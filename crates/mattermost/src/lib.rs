//! Mattermost surface - REST client + realtime event stream
//!
//! This crate is the bot's only contact with the server:
//! - **REST** (`client`) - liveness probe, login, team/channel listing, post
//!   creation, with the session token and active team held as client state
//! - **Events** (`events`) - realtime envelope parsing and typed dispatch
//! - **Socket** (`socket`) - websocket transport and the single-consumer
//!   event pump
//!
//! # Architecture
//!
//! ```text
//! Websocket frames → EventTransport → EventPump → EventDispatcher → Handlers
//!                                                       ↓
//!                                       RestClient (outbound replies)
//! ```

pub mod client;
pub mod events;
pub mod socket;
