//! Match resource client, scoped under a tournament.

use crate::envelope::{unwrap_collection, unwrap_record, Record};
use crate::error::ApiError;
use crate::params::ParamList;
use crate::transport::Transport;

/// Fields for score reporting on a match.
///
/// `scores_csv` holds per-game `p1-p2` pairs (`"3-1,2-2"`). The service
/// requires `scores_csv` whenever `winner_id` is set, but `scores_csv` alone
/// may be sent repeatedly for live updates; that contract is remote-enforced
/// and not validated here. Changing the winner of a completed match resets
/// every downstream bracket match.
#[derive(Debug, Clone, Default)]
pub struct MatchUpdate {
    pub scores_csv: Option<String>,
    /// Winning participant ID, or the literal `"tie"` (round robin / swiss).
    pub winner_id: Option<String>,
    pub player1_votes: Option<u32>,
    pub player2_votes: Option<u32>,
}

impl MatchUpdate {
    fn to_params(&self) -> ParamList {
        let mut params = ParamList::new();
        params.opt("match[scores_csv]", self.scores_csv.as_deref());
        params.opt("match[winner_id]", self.winner_id.as_deref());
        params.opt("match[player1_votes]", self.player1_votes);
        params.opt("match[player2_votes]", self.player2_votes);
        params
    }
}

/// Stateless facade over `tournaments/{id}/matches`.
#[derive(Debug, Clone, Copy)]
pub struct MatchClient<'a> {
    http: &'a Transport,
}

impl<'a> MatchClient<'a> {
    pub(crate) fn new(http: &'a Transport) -> Self {
        Self { http }
    }

    /// Fetch the tournament's match list, optionally filtered by state
    /// (`open`, `pending`, `complete`) and/or a participant.
    pub fn list(
        &self,
        tournament_id: &str,
        state: Option<&str>,
        participant_id: Option<&str>,
    ) -> Result<Vec<Record>, ApiError> {
        let mut params = ParamList::new();
        params.opt("state", state);
        params.opt("participant_id", participant_id);

        let response = self
            .http
            .get(&format!("tournaments/{tournament_id}/matches.json"), params)?;
        unwrap_collection(response, "match")
    }

    /// Fetch a single match record.
    pub fn get(
        &self,
        tournament_id: &str,
        match_id: &str,
        include_attachments: bool,
    ) -> Result<Record, ApiError> {
        let mut params = ParamList::new();
        if include_attachments {
            params.push("include_attachments", 1);
        }
        let response = self.http.get(
            &format!("tournaments/{tournament_id}/matches/{match_id}.json"),
            params,
        )?;
        unwrap_record(response, "match")
    }

    /// Update/submit scores for a match.
    pub fn update(
        &self,
        tournament_id: &str,
        match_id: &str,
        update: &MatchUpdate,
    ) -> Result<Record, ApiError> {
        let response = self.http.put(
            &format!("tournaments/{tournament_id}/matches/{match_id}.json"),
            update.to_params(),
        )?;
        unwrap_record(response, "match")
    }

    /// Reopen a completed match, automatically resetting the matches that
    /// follow it. The match returns to `open`.
    pub fn reopen(&self, tournament_id: &str, match_id: &str) -> Result<Record, ApiError> {
        self.action(tournament_id, match_id, "reopen")
    }

    /// Stamp `underway_at`, highlighting the match in the bracket.
    pub fn set_underway(&self, tournament_id: &str, match_id: &str) -> Result<Record, ApiError> {
        self.action(tournament_id, match_id, "mark_as_underway")
    }

    /// Clear `underway_at`, unhighlighting the match.
    pub fn unset_underway(
        &self,
        tournament_id: &str,
        match_id: &str,
    ) -> Result<Record, ApiError> {
        self.action(tournament_id, match_id, "unmark_as_underway")
    }

    fn action(
        &self,
        tournament_id: &str,
        match_id: &str,
        action: &str,
    ) -> Result<Record, ApiError> {
        let response = self.http.post(
            &format!("tournaments/{tournament_id}/matches/{match_id}/{action}.json"),
            ParamList::new(),
        )?;
        unwrap_record(response, "match")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_uses_match_scoped_keys() {
        let update = MatchUpdate {
            scores_csv: Some("3-1,2-2".to_string()),
            winner_id: Some("42".to_string()),
            ..Default::default()
        };
        let pairs = update.to_params().into_pairs();
        assert_eq!(
            pairs,
            vec![
                ("match[scores_csv]".to_string(), "3-1,2-2".to_string()),
                ("match[winner_id]".to_string(), "42".to_string()),
            ]
        );
    }

    #[test]
    fn tie_winner_is_passed_through_verbatim() {
        let update = MatchUpdate {
            scores_csv: Some("1-1".to_string()),
            winner_id: Some("tie".to_string()),
            ..Default::default()
        };
        let pairs = update.to_params().into_pairs();
        assert!(pairs.contains(&("match[winner_id]".to_string(), "tie".to_string())));
    }

    #[test]
    fn scores_alone_are_allowed_for_live_updates() {
        let update = MatchUpdate {
            scores_csv: Some("2-0".to_string()),
            ..Default::default()
        };
        let pairs = update.to_params().into_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "match[scores_csv]");
    }
}
