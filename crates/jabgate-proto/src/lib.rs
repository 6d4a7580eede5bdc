//! # jabgate-proto
//!
//! Client-side XMPP stream handling for the jabgate push gateway.
//!
//! ## Features
//!
//! - Incremental decoding of the never-ending `<stream:stream>` document into
//!   discrete top-level elements ([`StreamCodec`])
//! - A small owned element tree for inspecting decoded stanzas ([`Element`])
//! - Builders for every stanza the client side of the handshake sends
//! - A roster model with partial-update merge semantics ([`Roster`])
//! - A sans-IO session state machine that turns decoded frames into
//!   outbound stanzas and inbound events ([`SessionMachine`])
//!
//! ## Quick Start
//!
//! ```rust
//! use jabgate_proto::{Frame, StreamCodec};
//!
//! let mut codec = StreamCodec::new();
//! let frames: Vec<Frame> = codec
//!     .feed(b"<stream:stream xmlns='jabber:client' version='1.0'><presence from='b@example.com/x'/")
//!     .collect();
//! assert_eq!(frames.len(), 1);
//!
//! // The rest of the presence arrives on the next read.
//! let frames: Vec<Frame> = codec.feed(b">").collect();
//! assert!(matches!(frames[0], Frame::Stanza(_)));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod auth;
pub mod codec;
pub mod element;
pub mod error;
pub mod escape;
pub mod event;
pub mod jid;
pub mod roster;
pub mod session;
pub mod stanza;

pub use self::codec::{Frame, Frames, Stanza, StreamCodec, MAX_STANZA_BUFFER_SIZE};
pub use self::element::Element;
pub use self::error::ProtocolError;
pub use self::escape::{escape, unescape};
pub use self::event::{InboundEvent, MessageEvent, PresenceEvent};
pub use self::roster::{Roster, RosterEntry};
pub use self::session::{
    SessionAction, SessionConfig, SessionFailure, SessionMachine, SessionStage,
};
