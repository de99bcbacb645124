//! Composition root wiring the four resource facades to one transport.

use crate::attachment::AttachmentClient;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::matches::MatchClient;
use crate::participant::ParticipantClient;
use crate::tournament::TournamentClient;
use crate::transport::Transport;

/// Entry point for the Challonge v1 API.
///
/// Owns the single [`Transport`]; the resource accessors hand out stateless
/// facades borrowing it, so the credentials and UTC offset are resolved once
/// and shared by every call.
///
/// ```no_run
/// # fn main() -> Result<(), challonge_core::ApiError> {
/// let api = challonge_core::ChallongeApi::from_env()?;
/// let open = api.tournaments().list(&Default::default())?;
/// println!("{} tournaments", open.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChallongeApi {
    http: Transport,
}

impl ChallongeApi {
    /// Build the client from `CHALLONGE_USER` / `CHALLONGE_KEY` (and the
    /// optional `CHALLONGE_IANA_TZ_NAME` override).
    pub fn from_env() -> Result<Self, ApiError> {
        Ok(Self {
            http: Transport::from_env()?,
        })
    }

    /// Build the client from an explicit configuration.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        Ok(Self {
            http: Transport::new(config)?,
        })
    }

    /// Bare connectivity check: the most basic authenticated request the
    /// service accepts. Returns the raw response body.
    pub fn heartbeat(&self) -> Result<String, ApiError> {
        self.http.get_text("")
    }

    /// The shared transport, for callers that need the resolved UTC offset
    /// or raw access to the HTTP surface.
    pub fn transport(&self) -> &Transport {
        &self.http
    }

    pub fn tournaments(&self) -> TournamentClient<'_> {
        TournamentClient::new(&self.http)
    }

    pub fn participants(&self) -> ParticipantClient<'_> {
        ParticipantClient::new(&self.http)
    }

    pub fn matches(&self) -> MatchClient<'_> {
        MatchClient::new(&self.http)
    }

    pub fn attachments(&self) -> AttachmentClient<'_> {
        AttachmentClient::new(&self.http)
    }
}
