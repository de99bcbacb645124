//! Synchronous client for the Challonge v1 tournament API.
//!
//! # Overview
//! Every piece of tournament logic (brackets, seeding, state transitions)
//! runs on the remote service; this crate translates typed method calls into
//! the service's form-encoded wire format, performs one blocking HTTP round
//! trip per call, and unwraps the JSON envelopes into plain mappings.
//!
//! # Design
//! - [`Transport`] resolves credentials and a UTC offset once at
//!   construction and performs the authenticated round trips; no retries,
//!   no caching, no identity map.
//! - Four stateless resource facades ([`TournamentClient`],
//!   [`ParticipantClient`], [`MatchClient`], [`AttachmentClient`]) share the
//!   one transport through [`ChallongeApi`].
//! - Entities stay untyped ([`Record`]); their shape is owned by the remote
//!   service and round-tripped opaquely.
//! - Request building and response classification are plain-data steps, so
//!   the wire contract is testable without a server.

pub mod attachment;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod matches;
pub mod params;
pub mod participant;
pub mod tournament;
pub mod transport;

pub use attachment::{AttachmentClient, AttachmentFields};
pub use client::ChallongeApi;
pub use config::ApiConfig;
pub use envelope::Record;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use matches::{MatchClient, MatchUpdate};
pub use params::ParamList;
pub use participant::{ParticipantClient, ParticipantFields};
pub use tournament::{Include, TournamentClient, TournamentFields, TournamentListFilters};
pub use transport::Transport;
