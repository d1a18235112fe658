//! Asterisk Manager Interface (AMI) client for Rust
//!
//! This crate provides an async client for the Asterisk Manager Interface,
//! the line-oriented TCP protocol used to send actions to an Asterisk server
//! (hang up, originate, query channels) and receive the events it emits.
//!
//! # Architecture
//!
//! One [`AmiConnection`] owns its socket. There is no background reader:
//! while an action awaits its response, frames are read in order, events
//! among them are handed to the registered [`EventHandler`]s, and the wait
//! ends at the response carrying the action's `ActionID`. Responses that
//! open an event list (`EventList: start`) come back with the list members
//! attached as [`AmiMessage::events`].
//!
//! To consume events on another task, register a [`ChannelForwarder`] and
//! read from its [`AmiEventStream`].
//!
//! # Examples
//!
//! ## Sending actions
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiConnection, AmiError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let mut ami = AmiConnection::connect("127.0.0.1:5038", "admin", "secret").await?;
//!
//!     let pong = ami.ping().await?;
//!     println!("ping: {:?}", pong.status());
//!
//!     let peers = ami.command("sip show peers").await?;
//!     println!("{}", peers);
//!
//!     let response = ami
//!         .invoke(
//!             "Originate",
//!             [
//!                 ("Channel", "SIP/100"),
//!                 ("Context", "default"),
//!                 ("Exten", "200"),
//!                 ("Priority", "1"),
//!                 ("Variable", "CALLER=ami"),
//!                 ("Variable", "RETRIES=2"),
//!             ],
//!         )
//!         .await?;
//!     println!("originate: {:?}", response.message());
//!
//!     ami.disconnect().await
//! }
//! ```
//!
//! ## Receiving events
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use asterisk_ami_tokio::{AmiConfig, AmiConnection, ChannelForwarder};
//! use futures_util::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AmiConfig::default().with_overrides([
//!         ("server", "pbx.local"),
//!         ("username", "admin"),
//!         ("secret", "secret"),
//!     ])?;
//!     let mut ami = AmiConnection::connect_with_config(&config).await?;
//!
//!     let (forwarder, mut events) = ChannelForwarder::new();
//!     ami.add_event_handler("*", forwarder)?;
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = events.next().await {
//!             println!("{:?}: {:?}", event.event_name(), event.channel_state());
//!         }
//!     });
//!
//!     // Reading drives event dispatch.
//!     while !ami.is_closed() {
//!         ami.next_message(Some(Duration::from_secs(30))).await?;
//!     }
//!     Ok(())
//! }
//! ```

#[macro_use]
mod macros;

pub mod action;
pub mod buffer;
pub mod channel;
pub mod commands;
pub mod config;
pub mod connection;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod fields;
pub mod message;

pub(crate) mod reader;

pub use action::{Action, ActionIdGenerator};
pub use buffer::FrameBuffer;
pub use channel::{ChannelState, ParseChannelStateError};
pub use commands::{ActionSpec, ACTIONS};
pub use config::{AmiConfig, ConfigError};
pub use connection::AmiConnection;
pub use constants::DEFAULT_AMI_PORT;
pub use dispatcher::{AmiEventStream, ChannelForwarder, EventDispatcher, EventHandler};
pub use error::{AmiError, AmiResult};
pub use fields::{AmiField, ParseAmiFieldError, ParseResponseStatusError, ResponseStatus};
pub use message::{parse_message, AmiMessage, Fields, MessageKind};
