//! Match-attachment resource client, nested under a specific match.

use crate::envelope::{unwrap_collection, unwrap_record, Record};
use crate::error::ApiError;
use crate::params::ParamList;
use crate::transport::Transport;

/// Fields for attachment create/update. When both `asset` and `url` are
/// given the service keeps the asset and ignores the URL; a match holds at
/// most four attachments (remote-enforced).
#[derive(Debug, Clone, Default)]
pub struct AttachmentFields {
    /// File upload reference (250KB max).
    pub asset: Option<String>,
    pub url: Option<String>,
    /// Description of the file or URL, or standalone text.
    pub description: Option<String>,
}

impl AttachmentFields {
    fn to_params(&self) -> ParamList {
        let mut params = ParamList::new();
        params.opt("match_attachment[asset]", self.asset.as_deref());
        params.opt("match_attachment[url]", self.url.as_deref());
        params.opt("match_attachment[description]", self.description.as_deref());
        params
    }
}

/// Stateless facade over `tournaments/{t}/matches/{m}/attachments`.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentClient<'a> {
    http: &'a Transport,
}

impl<'a> AttachmentClient<'a> {
    pub(crate) fn new(http: &'a Transport) -> Self {
        Self { http }
    }

    /// Fetch the attachments on a match.
    pub fn list(&self, tournament_id: &str, match_id: &str) -> Result<Vec<Record>, ApiError> {
        let response = self.http.get(
            &format!("tournaments/{tournament_id}/matches/{match_id}/attachments.json"),
            ParamList::new(),
        )?;
        unwrap_collection(response, "match_attachment")
    }

    /// Create a new attachment on a match.
    pub fn create(
        &self,
        tournament_id: &str,
        match_id: &str,
        fields: &AttachmentFields,
    ) -> Result<Record, ApiError> {
        let response = self.http.post(
            &format!("tournaments/{tournament_id}/matches/{match_id}/attachments.json"),
            fields.to_params(),
        )?;
        unwrap_record(response, "match_attachment")
    }

    /// Fetch a single attachment record.
    pub fn get(
        &self,
        tournament_id: &str,
        match_id: &str,
        attachment_id: &str,
    ) -> Result<Record, ApiError> {
        let response = self.http.get(
            &format!(
                "tournaments/{tournament_id}/matches/{match_id}/attachments/{attachment_id}.json"
            ),
            ParamList::new(),
        )?;
        unwrap_record(response, "match_attachment")
    }

    /// Update an attachment's attributes.
    pub fn update(
        &self,
        tournament_id: &str,
        match_id: &str,
        attachment_id: &str,
        fields: &AttachmentFields,
    ) -> Result<Record, ApiError> {
        let response = self.http.put(
            &format!(
                "tournaments/{tournament_id}/matches/{match_id}/attachments/{attachment_id}.json"
            ),
            fields.to_params(),
        )?;
        unwrap_record(response, "match_attachment")
    }

    /// Delete an attachment.
    pub fn delete(
        &self,
        tournament_id: &str,
        match_id: &str,
        attachment_id: &str,
    ) -> Result<Record, ApiError> {
        let response = self.http.delete(
            &format!(
                "tournaments/{tournament_id}/matches/{match_id}/attachments/{attachment_id}.json"
            ),
            ParamList::new(),
        )?;
        unwrap_record(response, "match_attachment")
    }
}
