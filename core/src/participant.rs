//! Participant resource client, scoped under a tournament.
//!
//! Seeding, waiting-list promotion, and forfeit handling are all
//! server-side; these methods only shape the wire parameters.

use crate::envelope::{unwrap_collection, unwrap_record, Record};
use crate::error::ApiError;
use crate::params::ParamList;
use crate::transport::Transport;

/// Optional fields for participant add/update.
#[derive(Debug, Clone, Default)]
pub struct ParticipantFields {
    pub name: Option<String>,
    /// Registered Challonge username; invited by the service when set.
    pub challonge_username: Option<String>,
    pub email: Option<String>,
    pub seed: Option<u32>,
    /// Free-form text only visible via the API.
    pub misc: Option<String>,
}

impl ParticipantFields {
    fn to_params(&self) -> ParamList {
        let mut params = ParamList::new();
        params.opt("participant[name]", self.name.as_deref());
        params.opt(
            "participant[challonge_username]",
            self.challonge_username.as_deref(),
        );
        params.opt("participant[email]", self.email.as_deref());
        params.opt("participant[seed]", self.seed);
        params.opt("participant[misc]", self.misc.as_deref());
        params
    }
}

/// Stateless facade over `tournaments/{id}/participants`.
#[derive(Debug, Clone, Copy)]
pub struct ParticipantClient<'a> {
    http: &'a Transport,
}

impl<'a> ParticipantClient<'a> {
    pub(crate) fn new(http: &'a Transport) -> Self {
        Self { http }
    }

    /// Fetch the tournament's participant list.
    pub fn list(&self, tournament_id: &str) -> Result<Vec<Record>, ApiError> {
        let response = self.http.get(
            &format!("tournaments/{tournament_id}/participants.json"),
            ParamList::new(),
        )?;
        unwrap_collection(response, "participant")
    }

    /// Add one participant. Permitted until the tournament starts
    /// (remote-enforced).
    pub fn add(
        &self,
        tournament_id: &str,
        fields: &ParticipantFields,
    ) -> Result<Record, ApiError> {
        let response = self.http.post(
            &format!("tournaments/{tournament_id}/participants.json"),
            fields.to_params(),
        )?;
        unwrap_record(response, "participant")
    }

    /// Bulk-add participants. Names and username/email entries are
    /// independent sources: N names and M usernames yield N+M participants.
    /// The service rolls back the whole batch if any entry is invalid.
    pub fn add_multiple(
        &self,
        tournament_id: &str,
        names: &[String],
        usernames_or_emails: &[String],
        seeds: &[u32],
        miscs: &[String],
    ) -> Result<Vec<Record>, ApiError> {
        let mut params = ParamList::new();
        params.many("participants[][name]", names);
        params.many("participants[][invite_name_or_email]", usernames_or_emails);
        params.many("participants[][seed]", seeds);
        params.many("participants[][misc]", miscs);

        let response = self.http.post(
            &format!("tournaments/{tournament_id}/participants/bulk_add.json"),
            params,
        )?;
        unwrap_collection(response, "participant")
    }

    /// Fetch a single participant record.
    pub fn get(
        &self,
        tournament_id: &str,
        participant_id: &str,
        include_matches: bool,
    ) -> Result<Record, ApiError> {
        let mut params = ParamList::new();
        if include_matches {
            params.push("include_matches", 1);
        }
        let response = self.http.get(
            &format!("tournaments/{tournament_id}/participants/{participant_id}.json"),
            params,
        )?;
        unwrap_record(response, "participant")
    }

    /// Update a participant's attributes.
    pub fn update(
        &self,
        tournament_id: &str,
        participant_id: &str,
        fields: &ParticipantFields,
    ) -> Result<Record, ApiError> {
        let response = self.http.put(
            &format!("tournaments/{tournament_id}/participants/{participant_id}.json"),
            fields.to_params(),
        )?;
        unwrap_record(response, "participant")
    }

    /// Check a participant in, stamping `checked_in_at`.
    pub fn check_in(
        &self,
        tournament_id: &str,
        participant_id: &str,
    ) -> Result<Record, ApiError> {
        let response = self.http.post(
            &format!("tournaments/{tournament_id}/participants/{participant_id}/check_in.json"),
            ParamList::new(),
        )?;
        unwrap_record(response, "participant")
    }

    /// Undo a check-in, clearing `checked_in_at`.
    pub fn check_out(
        &self,
        tournament_id: &str,
        participant_id: &str,
    ) -> Result<Record, ApiError> {
        let response = self.http.post(
            &format!(
                "tournaments/{tournament_id}/participants/{participant_id}/undo_check_in.json"
            ),
            ParamList::new(),
        )?;
        unwrap_record(response, "participant")
    }

    /// Remove a participant. Before the start this deletes the record and
    /// compacts the abandoned seed; once underway the service instead marks
    /// the participant inactive and forfeits their remaining matches.
    pub fn remove(
        &self,
        tournament_id: &str,
        participant_id: &str,
    ) -> Result<Record, ApiError> {
        let response = self.http.delete(
            &format!("tournaments/{tournament_id}/participants/{participant_id}.json"),
            ParamList::new(),
        )?;
        unwrap_record(response, "participant")
    }

    /// Remove every participant (pre-start only). Returns the service's
    /// confirmation message rather than a record.
    pub fn remove_all(&self, tournament_id: &str) -> Result<String, ApiError> {
        let response = self.http.delete(
            &format!("tournaments/{tournament_id}/participants/clear.json"),
            ParamList::new(),
        )?;
        match response.get("message").and_then(|m| m.as_str()) {
            Some(message) => Ok(message.to_string()),
            None => Err(ApiError::Decode(
                "clear response carried no confirmation message".to_string(),
            )),
        }
    }

    /// Reshuffle seed assignments (pre-start only). Returns the reordered
    /// collection.
    pub fn randomize(&self, tournament_id: &str) -> Result<Vec<Record>, ApiError> {
        let response = self.http.post(
            &format!("tournaments/{tournament_id}/participants/randomize.json"),
            ParamList::new(),
        )?;
        unwrap_collection(response, "participant")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_omit_everything_absent() {
        let params = ParticipantFields::default().to_params();
        assert!(params.is_empty());
    }

    #[test]
    fn fields_use_participant_scoped_keys() {
        let fields = ParticipantFields {
            name: Some("mia".to_string()),
            seed: Some(3),
            ..Default::default()
        };
        let pairs = fields.to_params().into_pairs();
        assert_eq!(
            pairs,
            vec![
                ("participant[name]".to_string(), "mia".to_string()),
                ("participant[seed]".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn bulk_sources_stay_independent() {
        // 2 names and 3 invites must produce 5 wire entries, not a zip.
        let names = vec!["a".to_string(), "b".to_string()];
        let invites = vec!["x@y.z".to_string(), "u1".to_string(), "u2".to_string()];

        let mut params = ParamList::new();
        params.many("participants[][name]", &names);
        params.many("participants[][invite_name_or_email]", &invites);

        let pairs = params.into_pairs();
        let name_entries = pairs.iter().filter(|(k, _)| k == "participants[][name]").count();
        let invite_entries = pairs
            .iter()
            .filter(|(k, _)| k == "participants[][invite_name_or_email]")
            .count();
        assert_eq!(name_entries, 2);
        assert_eq!(invite_entries, 3);
        assert_eq!(pairs.len(), 5);
    }
}
