//! Client-side session core for a realtime conversational UI.
//!
//! The crate keeps a typed mirror of a chat session: the conversation log,
//! out-of-band elements, who holds the turn, and any structured command in
//! flight. A connection manager owns the socket and funnels every inbound
//! event and client command through one pure reducer ([`dispatch::dispatch`]),
//! so the full protocol surface is testable without any I/O.
//!
//! Hosts hold a [`ChatClient`], implement [`session::Collaborators`] for the
//! integrations they have (speech, theming, local functions), and read shared
//! state through [`state::StateHandle`].

pub mod client;
pub mod dispatch;
pub mod gather;
pub mod protocol;
pub mod session;
pub mod state;
pub mod store;
pub mod turn;

pub use client::{ChatClient, UploadHandle};
pub use dispatch::{dispatch, Command, Input, SessionContext, SideEffect};
pub use protocol::{
    Action, Element, GatherCommandKind, GatherCommandResponse, GatherCommandSpec, Outgoing,
    ServerEvent, Spec, Step, UserInputKind,
};
pub use session::socket::WsTransport;
pub use session::transport::{ConnectError, HandshakeMetadata, Transport};
pub use session::{Collaborators, ConnectParams, NoopCollaborators, Session, SessionCommand};
pub use state::{ActionError, ChatState, ConnectionStatus, StateHandle};
pub use store::{ElementRegistry, MessageLog};
pub use turn::{FutureTurn, TurnArbiter};
