//! Tournament resource client: CRUD plus the server-side lifecycle
//! transitions (`pending → checking_in → checked_in → underway → complete`).
//!
//! All bracket logic lives on the remote service; the single piece of logic
//! enforced here is the `start` guard, which refuses to start a tournament
//! with fewer than two participants.

use crate::envelope::{unwrap_collection, unwrap_record, Record};
use crate::error::ApiError;
use crate::params::ParamList;
use crate::participant::ParticipantClient;
use crate::transport::Transport;

/// Flags asking the service to embed associated records in the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct Include {
    pub participants: bool,
    pub matches: bool,
}

impl Include {
    fn apply(self, params: &mut ParamList) {
        if self.participants {
            params.push("include_participants", 1);
        }
        if self.matches {
            params.push("include_matches", 1);
        }
    }
}

/// Filters for [`TournamentClient::list`].
#[derive(Debug, Clone, Default)]
pub struct TournamentListFilters {
    /// One of `all`, `pending`, `in_progress`, `ended`.
    pub state: Option<String>,
    /// One of `single_elimination`, `double_elimination`, `round_robin`, `swiss`.
    pub tournament_type: Option<String>,
    /// `YYYY-MM-DD`.
    pub created_after: Option<String>,
    /// `YYYY-MM-DD`.
    pub created_before: Option<String>,
    /// Organization subdomain. Not supported against the v1 surface; any
    /// value fails the call before network I/O.
    pub subdomain: Option<String>,
}

/// Optional fields for tournament create/update.
///
/// Boolean toggles are plain `bool`s (default `false`) because the wire
/// contract sends every one of them as the literal `"true"` or `"false"`;
/// everything else is omitted when `None`.
#[derive(Debug, Clone, Default)]
pub struct TournamentFields {
    /// Event name/title, at most 60 characters.
    pub name: Option<String>,
    /// `single_elimination` (service default), `double_elimination`,
    /// `round_robin`, or `swiss`.
    pub tournament_type: Option<String>,
    /// URL slug (letters, numbers, underscores); the service generates one
    /// when blank on create.
    pub url: Option<String>,
    /// Not supported against the v1 surface; any value fails the call.
    pub subdomain: Option<String>,
    /// Description/instructions displayed above the bracket.
    pub description: Option<String>,
    /// Have the service host a sign-up page.
    pub open_signup: bool,
    /// Single elimination only: play a match between semifinal losers.
    pub hold_third_place_match: bool,
    // Swiss scoring weights.
    pub pts_for_match_win: Option<f64>,
    pub pts_for_match_tie: Option<f64>,
    pub pts_for_game_win: Option<f64>,
    pub pts_for_game_tie: Option<f64>,
    pub pts_for_bye: Option<f64>,
    pub swiss_rounds: Option<u32>,
    /// `match wins`, `game wins`, `points scored`, `points difference`, `custom`.
    pub ranked_by: Option<String>,
    // Round robin "custom" scoring weights.
    pub rr_pts_for_match_win: Option<f64>,
    pub rr_pts_for_match_tie: Option<f64>,
    pub rr_pts_for_game_win: Option<f64>,
    pub rr_pts_for_game_tie: Option<f64>,
    pub accept_attachments: bool,
    pub hide_forum: bool,
    pub show_rounds: bool,
    pub private: bool,
    pub notify_users_when_matches_open: bool,
    pub notify_users_when_the_tournament_ends: bool,
    pub sequential_pairings: bool,
    /// Maximum bracket size; later sign-ups land on a waiting list.
    pub signup_cap: Option<u32>,
    /// Planned start time. A value without a UTC offset gets the transport's
    /// construction-time `±HH:MM` offset appended.
    pub start_at: Option<String>,
    /// Length of the participant check-in window, in minutes.
    pub check_in_duration: Option<u32>,
    /// Double elimination only: `single match` or `skip`.
    pub grand_finals_modifier: Option<String>,
    /// 1 (exponential) or 2 (linear); required for `open_for_predictions`.
    pub prediction_method: Option<u8>,
}

impl TournamentFields {
    /// Translate to `tournament[...]` wire pairs. `utc_offset` completes a
    /// `start_at` that lacks one.
    fn to_params(&self, utc_offset: &str) -> Result<ParamList, ApiError> {
        if self.subdomain.is_some() {
            return Err(ApiError::Unsupported(
                "subdomain-scoped tournaments".to_string(),
            ));
        }

        let mut params = ParamList::new();
        params.opt("tournament[name]", self.name.as_deref());
        params.opt("tournament[tournament_type]", self.tournament_type.as_deref());
        params.opt("tournament[url]", self.url.as_deref());
        params.opt("tournament[description]", self.description.as_deref());
        params.flag("tournament[open_signup]", self.open_signup);
        params.flag(
            "tournament[hold_third_place_match]",
            self.hold_third_place_match,
        );
        params.opt("tournament[pts_for_match_win]", self.pts_for_match_win);
        params.opt("tournament[pts_for_match_tie]", self.pts_for_match_tie);
        params.opt("tournament[pts_for_game_win]", self.pts_for_game_win);
        params.opt("tournament[pts_for_game_tie]", self.pts_for_game_tie);
        params.opt("tournament[pts_for_bye]", self.pts_for_bye);
        params.opt("tournament[swiss_rounds]", self.swiss_rounds);
        params.opt("tournament[ranked_by]", self.ranked_by.as_deref());
        params.opt("tournament[rr_pts_for_match_win]", self.rr_pts_for_match_win);
        params.opt("tournament[rr_pts_for_match_tie]", self.rr_pts_for_match_tie);
        params.opt("tournament[rr_pts_for_game_win]", self.rr_pts_for_game_win);
        params.opt("tournament[rr_pts_for_game_tie]", self.rr_pts_for_game_tie);
        params.flag("tournament[accept_attachments]", self.accept_attachments);
        params.flag("tournament[hide_forum]", self.hide_forum);
        params.flag("tournament[show_rounds]", self.show_rounds);
        params.flag("tournament[private]", self.private);
        params.flag(
            "tournament[notify_users_when_matches_open]",
            self.notify_users_when_matches_open,
        );
        params.flag(
            "tournament[notify_users_when_the_tournament_ends]",
            self.notify_users_when_the_tournament_ends,
        );
        params.flag("tournament[sequential_pairings]", self.sequential_pairings);
        params.opt("tournament[signup_cap]", self.signup_cap);
        params.opt(
            "tournament[start_at]",
            self.start_at
                .as_deref()
                .map(|s| complete_start_at(s, utc_offset)),
        );
        params.opt("tournament[check_in_duration]", self.check_in_duration);
        params.opt(
            "tournament[grand_finals_modifier]",
            self.grand_finals_modifier.as_deref(),
        );
        params.opt("tournament[prediction_method]", self.prediction_method);
        Ok(params)
    }
}

/// Append the stored UTC offset to a `start_at` that carries none.
fn complete_start_at(start_at: &str, utc_offset: &str) -> String {
    if has_utc_offset(start_at) {
        start_at.to_string()
    } else {
        format!("{start_at}{utc_offset}")
    }
}

fn has_utc_offset(start_at: &str) -> bool {
    if start_at.ends_with('Z') || start_at.ends_with('z') {
        return true;
    }
    // An offset can only appear after the time portion; a '-' before 'T' is a
    // date separator.
    match start_at.find('T') {
        Some(i) => {
            let time = &start_at[i + 1..];
            time.contains('+') || time.contains('-')
        }
        None => false,
    }
}

/// Stateless facade over the `tournaments` resource family.
#[derive(Debug, Clone, Copy)]
pub struct TournamentClient<'a> {
    http: &'a Transport,
}

impl<'a> TournamentClient<'a> {
    pub(crate) fn new(http: &'a Transport) -> Self {
        Self { http }
    }

    /// List tournaments on the account, in service order.
    pub fn list(&self, filters: &TournamentListFilters) -> Result<Vec<Record>, ApiError> {
        if filters.subdomain.is_some() {
            return Err(ApiError::Unsupported(
                "subdomain-scoped tournaments".to_string(),
            ));
        }

        let mut params = ParamList::new();
        params.opt("state", filters.state.as_deref());
        params.opt("tournament_type", filters.tournament_type.as_deref());
        params.opt("created_after", filters.created_after.as_deref());
        params.opt("created_before", filters.created_before.as_deref());

        let response = self.http.get("tournaments.json", params)?;
        unwrap_collection(response, "tournament")
    }

    /// Create a new tournament.
    pub fn create(&self, fields: &TournamentFields) -> Result<Record, ApiError> {
        let params = fields.to_params(self.http.utc_offset())?;
        let response = self.http.post("tournaments.json", params)?;
        unwrap_record(response, "tournament")
    }

    /// Fetch one tournament by numeric ID or URL slug.
    ///
    /// The only client-side required-field check in the library: an empty ID
    /// fails with [`ApiError::Validation`] before any network I/O.
    pub fn get(&self, tournament_id: &str, include: Include) -> Result<Record, ApiError> {
        if tournament_id.is_empty() {
            return Err(ApiError::Validation("a tournament ID is required".to_string()));
        }

        let mut params = ParamList::new();
        include.apply(&mut params);

        let response = self.http.get(&format!("tournaments/{tournament_id}.json"), params)?;
        unwrap_record(response, "tournament")
    }

    /// Update a tournament's attributes. Same field set as [`Self::create`].
    pub fn update(
        &self,
        tournament_id: &str,
        fields: &TournamentFields,
    ) -> Result<Record, ApiError> {
        let params = fields.to_params(self.http.utc_offset())?;
        let response = self
            .http
            .put(&format!("tournaments/{tournament_id}.json"), params)?;
        unwrap_record(response, "tournament")
    }

    /// Delete a tournament and all its associated records. There is no undo.
    /// Returns the deleted tournament's last-known fields.
    pub fn delete(&self, tournament_id: &str) -> Result<Record, ApiError> {
        let response = self
            .http
            .delete(&format!("tournaments/{tournament_id}.json"), ParamList::new())?;
        unwrap_record(response, "tournament")
    }

    /// Close the check-in window: no-shows become inactive bottom seeds
    /// (original order preserved), waiting-list participants are promoted,
    /// and the state moves `checking_in → checked_in`.
    pub fn process_checkins(
        &self,
        tournament_id: &str,
        include: Include,
    ) -> Result<Record, ApiError> {
        self.transition(tournament_id, "process_check_ins", include)
    }

    /// Reverse check-in processing: every participant is reactivated with
    /// its check-in timestamp cleared, and the state returns to `pending`.
    pub fn abort_checkins(
        &self,
        tournament_id: &str,
        include: Include,
    ) -> Result<Record, ApiError> {
        self.transition(tournament_id, "abort_check_in", include)
    }

    /// Start the tournament, opening first-round matches for reporting.
    ///
    /// Fetches the participant list first and fails with
    /// [`ApiError::Validation`] when fewer than two are registered; the
    /// `start` POST is only issued past that guard.
    pub fn start(&self, tournament_id: &str, include: Include) -> Result<Record, ApiError> {
        let participants = ParticipantClient::new(self.http).list(tournament_id)?;
        if participants.len() < 2 {
            return Err(ApiError::Validation(
                "a tournament needs at least two participants in order to start".to_string(),
            ));
        }
        self.transition(tournament_id, "start", include)
    }

    /// Finalize a tournament whose matches are all scored, making the
    /// results permanent (`underway → complete`).
    pub fn finalize(&self, tournament_id: &str, include: Include) -> Result<Record, ApiError> {
        self.transition(tournament_id, "finalize", include)
    }

    /// Reset a tournament to a pre-start state, clearing all scores and
    /// attachments. Matches disappear from subsequent listings.
    pub fn reset(&self, tournament_id: &str, include: Include) -> Result<Record, ApiError> {
        self.transition(tournament_id, "reset", include)
    }

    /// Open the tournament for predictions. Requires `prediction_method` 1
    /// or 2 (remote-enforced) and freezes participant mutation server-side.
    pub fn open_for_predictions(
        &self,
        tournament_id: &str,
        include: Include,
    ) -> Result<Record, ApiError> {
        self.transition(tournament_id, "open_for_predictions", include)
    }

    fn transition(
        &self,
        tournament_id: &str,
        action: &str,
        include: Include,
    ) -> Result<Record, ApiError> {
        let mut params = ParamList::new();
        include.apply(&mut params);
        let response = self
            .http
            .post(&format!("tournaments/{tournament_id}/{action}.json"), params)?;
        unwrap_record(response, "tournament")
    }
}
