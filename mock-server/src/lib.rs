//! In-memory stand-in for the Challonge v1 API.
//!
//! Speaks the same surface the client targets: basic auth, form-encoded
//! request bodies with bracketed keys, and JSON responses wrapped in
//! per-resource envelopes. State transitions follow the real service's
//! lifecycle (`pending → checking_in/checked_in → underway → complete`) with
//! two documented simplifications: check-in processing is allowed straight
//! from `pending`, and bracket generation stops at round one (enough for
//! exercising score reporting and reset).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, RawForm, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

/// Account identifier the server accepts.
pub const API_USER: &str = "alice";
/// Access key the server accepts.
pub const API_KEY: &str = "s3cr3t";

/// Body sent on failed authentication; mirrors the CDN's challenge text so
/// clients can exercise their 401 handling.
pub const AUTH_DENIED_BODY: &str = "HTTP Basic: Access denied.";

#[derive(Clone, Debug, Serialize)]
pub struct Tournament {
    pub id: u64,
    pub name: Option<String>,
    pub url: String,
    pub tournament_type: String,
    pub state: String,
    pub description: Option<String>,
    pub private: bool,
    pub accept_attachments: bool,
    pub prediction_method: u8,
    pub signup_cap: Option<u32>,
    pub start_at: Option<String>,
    pub check_in_duration: Option<u32>,
    pub grand_finals_modifier: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Participant {
    pub id: u64,
    pub tournament_id: u64,
    pub name: String,
    pub seed: u32,
    pub active: bool,
    pub checked_in_at: Option<String>,
    pub misc: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchRecord {
    pub id: u64,
    pub tournament_id: u64,
    pub state: String,
    pub round: u32,
    pub player1_id: u64,
    pub player2_id: u64,
    /// Participant ID, or the literal `"tie"`.
    pub winner_id: Option<Value>,
    pub scores_csv: Option<String>,
    pub underway_at: Option<String>,
    pub player1_votes: Option<u32>,
    pub player2_votes: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Attachment {
    pub id: u64,
    pub match_id: u64,
    pub asset: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
}

struct Entry {
    tournament: Tournament,
    participants: Vec<Participant>,
    matches: Vec<MatchRecord>,
    attachments: Vec<Attachment>,
    next_ref: u64,
}

impl Entry {
    fn new(tournament: Tournament) -> Self {
        Self {
            tournament,
            participants: Vec::new(),
            matches: Vec::new(),
            attachments: Vec::new(),
            next_ref: 0,
        }
    }

    fn alloc(&mut self) -> u64 {
        self.next_ref += 1;
        self.next_ref
    }
}

#[derive(Default)]
pub struct Store {
    next_id: u64,
    tournaments: HashMap<u64, Entry>,
}

impl Store {
    /// Resolve a tournament by numeric ID or URL slug.
    fn resolve(&self, raw: &str) -> Option<u64> {
        if let Ok(id) = raw.parse::<u64>() {
            if self.tournaments.contains_key(&id) {
                return Some(id);
            }
        }
        self.tournaments
            .values()
            .find(|e| e.tournament.url == raw)
            .map(|e| e.tournament.id)
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/", get(heartbeat))
        .route(
            "/tournaments.json",
            get(list_tournaments).post(create_tournament),
        )
        .route(
            "/tournaments/{id}",
            get(get_tournament)
                .put(update_tournament)
                .delete(delete_tournament),
        )
        .route(
            "/tournaments/{id}/process_check_ins.json",
            post(process_check_ins),
        )
        .route("/tournaments/{id}/abort_check_in.json", post(abort_check_in))
        .route("/tournaments/{id}/start.json", post(start_tournament))
        .route("/tournaments/{id}/finalize.json", post(finalize_tournament))
        .route("/tournaments/{id}/reset.json", post(reset_tournament))
        .route(
            "/tournaments/{id}/open_for_predictions.json",
            post(open_for_predictions),
        )
        .route(
            "/tournaments/{id}/participants.json",
            get(list_participants).post(add_participant),
        )
        .route(
            "/tournaments/{id}/participants/bulk_add.json",
            post(bulk_add_participants),
        )
        .route(
            "/tournaments/{id}/participants/clear.json",
            delete(clear_participants),
        )
        .route(
            "/tournaments/{id}/participants/randomize.json",
            post(randomize_participants),
        )
        .route(
            "/tournaments/{id}/participants/{pid}",
            get(get_participant)
                .put(update_participant)
                .delete(remove_participant),
        )
        .route(
            "/tournaments/{id}/participants/{pid}/check_in.json",
            post(check_in_participant),
        )
        .route(
            "/tournaments/{id}/participants/{pid}/undo_check_in.json",
            post(undo_check_in_participant),
        )
        .route("/tournaments/{id}/matches.json", get(list_matches))
        .route(
            "/tournaments/{id}/matches/{mid}",
            get(get_match).put(update_match),
        )
        .route(
            "/tournaments/{id}/matches/{mid}/reopen.json",
            post(reopen_match),
        )
        .route(
            "/tournaments/{id}/matches/{mid}/mark_as_underway.json",
            post(mark_underway),
        )
        .route(
            "/tournaments/{id}/matches/{mid}/unmark_as_underway.json",
            post(unmark_underway),
        )
        .route(
            "/tournaments/{id}/matches/{mid}/attachments.json",
            get(list_attachments).post(create_attachment),
        )
        .route(
            "/tournaments/{id}/matches/{mid}/attachments/{aid}",
            get(get_attachment)
                .put(update_attachment)
                .delete(delete_attachment),
        )
        .layer(middleware::from_fn(require_auth))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_auth(request: Request, next: Next) -> Response {
    let expected = format!("Basic {}", BASE64.encode(format!("{API_USER}:{API_KEY}")));
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);
    if authorized {
        next.run(request).await
    } else {
        (StatusCode::UNAUTHORIZED, AUTH_DENIED_BODY).into_response()
    }
}

// --- helpers ---

fn now_string() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn trim_json(raw: &str) -> &str {
    raw.strip_suffix(".json").unwrap_or(raw)
}

fn parse_pairs(body: &[u8]) -> Vec<(String, String)> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body).unwrap_or_default()
}

fn field<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn fields<'a>(pairs: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect()
}

fn api_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "errors": [message] }))).into_response()
}

fn unprocessable(message: &str) -> Response {
    api_error(StatusCode::UNPROCESSABLE_ENTITY, message)
}

fn tournament_not_found() -> Response {
    api_error(StatusCode::NOT_FOUND, "tournament not found")
}

fn query_flag(query: &HashMap<String, String>, key: &str) -> bool {
    matches!(query.get(key).map(String::as_str), Some("1") | Some("true"))
}

fn form_flag(pairs: &[(String, String)], key: &str) -> bool {
    matches!(field(pairs, key), Some("1") | Some("true"))
}

/// Lifecycle POSTs accept the include flags in the query string or in the
/// form body; clients form-encode all POST parameters into the body.
fn include_flags(
    query: &HashMap<String, String>,
    pairs: &[(String, String)],
) -> (bool, bool) {
    (
        query_flag(query, "include_participants") || form_flag(pairs, "include_participants"),
        query_flag(query, "include_matches") || form_flag(pairs, "include_matches"),
    )
}

/// Map a `state` list filter onto stored tournament states.
fn state_filter_matches(filter: &str, state: &str) -> bool {
    match filter {
        "all" => true,
        "pending" => matches!(
            state,
            "pending" | "checking_in" | "checked_in" | "accepting_predictions"
        ),
        "in_progress" => state == "underway",
        "ended" => state == "complete",
        other => state == other,
    }
}

fn render_tournament(entry: &Entry, include_participants: bool, include_matches: bool) -> Value {
    let mut t = json!(entry.tournament);
    t["participants_count"] = json!(entry.participants.len());
    if include_participants {
        t["participants"] = Value::Array(
            entry
                .participants
                .iter()
                .map(|p| json!({ "participant": p }))
                .collect(),
        );
    }
    if include_matches {
        t["matches"] = Value::Array(
            entry
                .matches
                .iter()
                .map(|m| json!({ "match": m }))
                .collect(),
        );
    }
    json!({ "tournament": t })
}

// --- tournaments ---

async fn heartbeat() -> &'static str {
    "ok"
}

async fn list_tournaments(
    State(db): State<Db>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let store = db.read().await;
    let mut entries: Vec<&Entry> = store
        .tournaments
        .values()
        .filter(|e| match query.get("state") {
            Some(filter) => state_filter_matches(filter, &e.tournament.state),
            None => true,
        })
        .filter(|e| match query.get("tournament_type") {
            Some(ty) => &e.tournament.tournament_type == ty,
            None => true,
        })
        .filter(|e| match query.get("created_after") {
            Some(after) => e.tournament.created_at.get(..10) >= Some(after.as_str()),
            None => true,
        })
        .filter(|e| match query.get("created_before") {
            Some(before) => e.tournament.created_at.get(..10) <= Some(before.as_str()),
            None => true,
        })
        .collect();
    entries.sort_by_key(|e| e.tournament.id);
    Json(Value::Array(
        entries
            .iter()
            .map(|e| render_tournament(e, false, false))
            .collect(),
    ))
}

fn apply_tournament_fields(
    tournament: &mut Tournament,
    pairs: &[(String, String)],
) -> Result<(), Response> {
    if let Some(name) = field(pairs, "tournament[name]") {
        if name.chars().count() > 60 {
            return Err(unprocessable("name is too long (maximum is 60 characters)"));
        }
        tournament.name = Some(name.to_string());
    }
    if let Some(ty) = field(pairs, "tournament[tournament_type]") {
        tournament.tournament_type = ty.to_string();
    }
    if let Some(url) = field(pairs, "tournament[url]") {
        tournament.url = url.to_string();
    }
    if let Some(description) = field(pairs, "tournament[description]") {
        tournament.description = Some(description.to_string());
    }
    if let Some(private) = field(pairs, "tournament[private]") {
        tournament.private = private == "true";
    }
    if let Some(accept) = field(pairs, "tournament[accept_attachments]") {
        tournament.accept_attachments = accept == "true";
    }
    if let Some(method) = field(pairs, "tournament[prediction_method]") {
        tournament.prediction_method = method
            .parse()
            .map_err(|_| unprocessable("prediction_method is invalid"))?;
    }
    if let Some(cap) = field(pairs, "tournament[signup_cap]") {
        tournament.signup_cap =
            Some(cap.parse().map_err(|_| unprocessable("signup_cap is invalid"))?);
    }
    if let Some(start_at) = field(pairs, "tournament[start_at]") {
        tournament.start_at = Some(start_at.to_string());
    }
    if let Some(duration) = field(pairs, "tournament[check_in_duration]") {
        tournament.check_in_duration = Some(
            duration
                .parse()
                .map_err(|_| unprocessable("check_in_duration is invalid"))?,
        );
    }
    if let Some(modifier) = field(pairs, "tournament[grand_finals_modifier]") {
        tournament.grand_finals_modifier = Some(modifier.to_string());
    }
    Ok(())
}

async fn create_tournament(
    State(db): State<Db>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let pairs = parse_pairs(&body);
    let mut store = db.write().await;
    store.next_id += 1;
    let id = store.next_id;

    let mut tournament = Tournament {
        id,
        name: None,
        url: format!("mock{id}"),
        tournament_type: "single elimination".to_string(),
        state: "pending".to_string(),
        description: None,
        private: false,
        accept_attachments: false,
        prediction_method: 0,
        signup_cap: None,
        start_at: None,
        check_in_duration: None,
        grand_finals_modifier: None,
        created_at: now_string(),
        started_at: None,
        completed_at: None,
    };
    apply_tournament_fields(&mut tournament, &pairs)?;

    let entry = Entry::new(tournament);
    let rendered = render_tournament(&entry, false, false);
    store.tournaments.insert(id, entry);
    Ok(Json(rendered))
}

async fn get_tournament(
    State(db): State<Db>,
    Path(raw): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, Response> {
    let include_participants = query_flag(&query, "include_participants");
    let include_matches = query_flag(&query, "include_matches");
    let store = db.read().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store.tournaments.get(&key).ok_or_else(tournament_not_found)?;
    Ok(Json(render_tournament(
        entry,
        include_participants,
        include_matches,
    )))
}

async fn update_tournament(
    State(db): State<Db>,
    Path(raw): Path<String>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let pairs = parse_pairs(&body);
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;
    apply_tournament_fields(&mut entry.tournament, &pairs)?;
    Ok(Json(render_tournament(entry, false, false)))
}

async fn delete_tournament(
    State(db): State<Db>,
    Path(raw): Path<String>,
) -> Result<Json<Value>, Response> {
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .remove(&key)
        .ok_or_else(tournament_not_found)?;
    Ok(Json(render_tournament(&entry, false, false)))
}

async fn process_check_ins(
    State(db): State<Db>,
    Path(raw): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let (include_participants, include_matches) = include_flags(&query, &parse_pairs(&body));
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    if !matches!(entry.tournament.state.as_str(), "pending" | "checking_in") {
        return Err(unprocessable("check-ins cannot be processed in this state"));
    }

    // Checked-in participants keep their relative order at the top; no-shows
    // go inactive at the bottom, also in original seed order.
    let mut order: Vec<(u32, u64, bool)> = entry
        .participants
        .iter()
        .map(|p| (p.seed, p.id, p.checked_in_at.is_some()))
        .collect();
    order.sort_unstable();
    let reseeded: Vec<(u64, bool)> = order
        .iter()
        .filter(|(_, _, checked)| *checked)
        .chain(order.iter().filter(|(_, _, checked)| !*checked))
        .map(|(_, id, checked)| (*id, *checked))
        .collect();
    for (position, (id, checked)) in reseeded.iter().enumerate() {
        if let Some(p) = entry.participants.iter_mut().find(|p| p.id == *id) {
            p.seed = position as u32 + 1;
            p.active = *checked;
        }
    }

    entry.tournament.state = "checked_in".to_string();
    Ok(Json(render_tournament(
        entry,
        include_participants,
        include_matches,
    )))
}

async fn abort_check_in(
    State(db): State<Db>,
    Path(raw): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let (include_participants, include_matches) = include_flags(&query, &parse_pairs(&body));
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    if !matches!(
        entry.tournament.state.as_str(),
        "checking_in" | "checked_in"
    ) {
        return Err(unprocessable("there is no check-in to abort"));
    }

    for p in &mut entry.participants {
        p.active = true;
        p.checked_in_at = None;
    }
    entry.tournament.state = "pending".to_string();
    Ok(Json(render_tournament(
        entry,
        include_participants,
        include_matches,
    )))
}

async fn start_tournament(
    State(db): State<Db>,
    Path(raw): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let (include_participants, include_matches) = include_flags(&query, &parse_pairs(&body));
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    if !matches!(entry.tournament.state.as_str(), "pending" | "checked_in") {
        return Err(unprocessable("tournament cannot be started in this state"));
    }

    let mut active: Vec<(u32, u64)> = entry
        .participants
        .iter()
        .filter(|p| p.active)
        .map(|p| (p.seed, p.id))
        .collect();
    if active.len() < 2 {
        return Err(unprocessable(
            "tournament needs at least two participants to start",
        ));
    }
    active.sort_unstable();

    let tournament_id = entry.tournament.id;
    let player_ids: Vec<u64> = active.into_iter().map(|(_, id)| id).collect();
    for pair in player_ids.chunks(2) {
        if let [player1, player2] = *pair {
            let id = entry.alloc();
            entry.matches.push(MatchRecord {
                id,
                tournament_id,
                state: "open".to_string(),
                round: 1,
                player1_id: player1,
                player2_id: player2,
                winner_id: None,
                scores_csv: None,
                underway_at: None,
                player1_votes: None,
                player2_votes: None,
            });
        }
    }

    entry.tournament.state = "underway".to_string();
    entry.tournament.started_at = Some(now_string());
    Ok(Json(render_tournament(
        entry,
        include_participants,
        include_matches,
    )))
}

async fn finalize_tournament(
    State(db): State<Db>,
    Path(raw): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let (include_participants, include_matches) = include_flags(&query, &parse_pairs(&body));
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    if entry.tournament.state != "underway" {
        return Err(unprocessable("tournament is not underway"));
    }
    if entry.matches.iter().any(|m| m.state != "complete") {
        return Err(unprocessable("all matches must be scored before finalizing"));
    }

    entry.tournament.state = "complete".to_string();
    entry.tournament.completed_at = Some(now_string());
    Ok(Json(render_tournament(
        entry,
        include_participants,
        include_matches,
    )))
}

async fn reset_tournament(
    State(db): State<Db>,
    Path(raw): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let (include_participants, include_matches) = include_flags(&query, &parse_pairs(&body));
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    entry.matches.clear();
    entry.attachments.clear();
    entry.tournament.state = "pending".to_string();
    entry.tournament.started_at = None;
    entry.tournament.completed_at = None;
    Ok(Json(render_tournament(
        entry,
        include_participants,
        include_matches,
    )))
}

async fn open_for_predictions(
    State(db): State<Db>,
    Path(raw): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let (include_participants, include_matches) = include_flags(&query, &parse_pairs(&body));
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    if !matches!(entry.tournament.prediction_method, 1 | 2) {
        return Err(unprocessable(
            "prediction_method must be set to 1 or 2 to accept predictions",
        ));
    }
    if entry.tournament.state != "pending" {
        return Err(unprocessable("tournament is not pending"));
    }

    entry.tournament.state = "accepting_predictions".to_string();
    Ok(Json(render_tournament(
        entry,
        include_participants,
        include_matches,
    )))
}

// --- participants ---

fn pre_start(state: &str) -> bool {
    matches!(
        state,
        "pending" | "checking_in" | "checked_in" | "accepting_predictions"
    )
}

async fn list_participants(
    State(db): State<Db>,
    Path(raw): Path<String>,
) -> Result<Json<Value>, Response> {
    let store = db.read().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store.tournaments.get(&key).ok_or_else(tournament_not_found)?;
    Ok(Json(Value::Array(
        entry
            .participants
            .iter()
            .map(|p| json!({ "participant": p }))
            .collect(),
    )))
}

async fn add_participant(
    State(db): State<Db>,
    Path(raw): Path<String>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let pairs = parse_pairs(&body);
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    if !pre_start(&entry.tournament.state) {
        return Err(unprocessable("participants cannot be added after the start"));
    }

    let name = field(&pairs, "participant[name]")
        .or_else(|| field(&pairs, "participant[challonge_username]"))
        .or_else(|| field(&pairs, "participant[email]"))
        .ok_or_else(|| unprocessable("participant needs a name, username, or email"))?
        .to_string();
    let seed = match field(&pairs, "participant[seed]") {
        Some(seed) => seed
            .parse()
            .map_err(|_| unprocessable("seed is invalid"))?,
        None => entry.participants.len() as u32 + 1,
    };

    let id = entry.alloc();
    let participant = Participant {
        id,
        tournament_id: entry.tournament.id,
        name,
        seed,
        active: true,
        checked_in_at: None,
        misc: field(&pairs, "participant[misc]").map(str::to_string),
    };
    let rendered = json!({ "participant": participant });
    entry.participants.push(participant);
    Ok(Json(rendered))
}

async fn bulk_add_participants(
    State(db): State<Db>,
    Path(raw): Path<String>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let pairs = parse_pairs(&body);
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    if !pre_start(&entry.tournament.state) {
        return Err(unprocessable("participants cannot be added after the start"));
    }

    // Names and invites are independent sources, never zipped.
    let names = fields(&pairs, "participants[][name]");
    let invites = fields(&pairs, "participants[][invite_name_or_email]");
    let seeds = fields(&pairs, "participants[][seed]");

    // All-or-nothing: validate the whole batch before touching state.
    if names.iter().chain(invites.iter()).any(|n| n.is_empty()) {
        return Err(unprocessable("a participant entry is blank"));
    }
    let mut parsed_seeds = Vec::new();
    for seed in seeds {
        parsed_seeds.push(
            seed.parse::<u32>()
                .map_err(|_| unprocessable("seed is invalid"))?,
        );
    }

    let tournament_id = entry.tournament.id;
    let mut added = Vec::new();
    for (position, name) in names.iter().chain(invites.iter()).enumerate() {
        let id = entry.alloc();
        let seed = parsed_seeds
            .get(position)
            .copied()
            .unwrap_or(entry.participants.len() as u32 + added.len() as u32 + 1);
        added.push(Participant {
            id,
            tournament_id,
            name: name.to_string(),
            seed,
            active: true,
            checked_in_at: None,
            misc: None,
        });
    }

    let rendered = Value::Array(added.iter().map(|p| json!({ "participant": p })).collect());
    entry.participants.extend(added);
    Ok(Json(rendered))
}

/// Look up a participant index by raw path segment.
fn participant_index(entry: &Entry, raw: &str) -> Option<usize> {
    let id = trim_json(raw).parse::<u64>().ok()?;
    entry.participants.iter().position(|p| p.id == id)
}

async fn get_participant(
    State(db): State<Db>,
    Path((raw, pid)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, Response> {
    let store = db.read().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store.tournaments.get(&key).ok_or_else(tournament_not_found)?;
    let index = participant_index(entry, &pid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "participant not found"))?;

    let mut p = json!(entry.participants[index]);
    if query_flag(&query, "include_matches") {
        let id = entry.participants[index].id;
        p["matches"] = Value::Array(
            entry
                .matches
                .iter()
                .filter(|m| m.player1_id == id || m.player2_id == id)
                .map(|m| json!({ "match": m }))
                .collect(),
        );
    }
    Ok(Json(json!({ "participant": p })))
}

async fn update_participant(
    State(db): State<Db>,
    Path((raw, pid)): Path<(String, String)>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let pairs = parse_pairs(&body);
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;
    let index = participant_index(entry, &pid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "participant not found"))?;

    let participant = &mut entry.participants[index];
    if let Some(name) = field(&pairs, "participant[name]") {
        participant.name = name.to_string();
    }
    if let Some(seed) = field(&pairs, "participant[seed]") {
        participant.seed = seed.parse().map_err(|_| unprocessable("seed is invalid"))?;
    }
    if let Some(misc) = field(&pairs, "participant[misc]") {
        participant.misc = Some(misc.to_string());
    }
    Ok(Json(json!({ "participant": participant })))
}

async fn check_in_participant(
    State(db): State<Db>,
    Path((raw, pid)): Path<(String, String)>,
) -> Result<Json<Value>, Response> {
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;
    let index = participant_index(entry, &pid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "participant not found"))?;
    entry.participants[index].checked_in_at = Some(now_string());
    Ok(Json(json!({ "participant": entry.participants[index] })))
}

async fn undo_check_in_participant(
    State(db): State<Db>,
    Path((raw, pid)): Path<(String, String)>,
) -> Result<Json<Value>, Response> {
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;
    let index = participant_index(entry, &pid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "participant not found"))?;
    entry.participants[index].checked_in_at = None;
    Ok(Json(json!({ "participant": entry.participants[index] })))
}

async fn remove_participant(
    State(db): State<Db>,
    Path((raw, pid)): Path<(String, String)>,
) -> Result<Json<Value>, Response> {
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;
    let index = participant_index(entry, &pid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "participant not found"))?;

    if entry.tournament.state == "underway" {
        // Underway: mark inactive and forfeit remaining matches.
        let id = entry.participants[index].id;
        entry.participants[index].active = false;
        for m in &mut entry.matches {
            if m.state == "open" && (m.player1_id == id || m.player2_id == id) {
                let opponent = if m.player1_id == id { m.player2_id } else { m.player1_id };
                m.state = "complete".to_string();
                m.winner_id = Some(json!(opponent));
            }
        }
        Ok(Json(json!({ "participant": entry.participants[index] })))
    } else {
        // Pre-start: delete and compact the abandoned seed.
        let removed = entry.participants.remove(index);
        entry.participants.sort_by_key(|p| p.seed);
        for (position, p) in entry.participants.iter_mut().enumerate() {
            p.seed = position as u32 + 1;
        }
        Ok(Json(json!({ "participant": removed })))
    }
}

async fn clear_participants(
    State(db): State<Db>,
    Path(raw): Path<String>,
) -> Result<Json<Value>, Response> {
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    if !pre_start(&entry.tournament.state) {
        return Err(unprocessable("participants cannot be cleared after the start"));
    }

    let count = entry.participants.len();
    entry.participants.clear();
    Ok(Json(json!({
        "message": format!("Cleared {count} participants")
    })))
}

async fn randomize_participants(
    State(db): State<Db>,
    Path(raw): Path<String>,
) -> Result<Json<Value>, Response> {
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    if !pre_start(&entry.tournament.state) {
        return Err(unprocessable("seeds cannot be randomized after the start"));
    }

    // Deterministic shuffle: reverse the current seed order. Enough to
    // observe a reordering without dragging in an RNG.
    entry.participants.sort_by_key(|p| p.seed);
    let count = entry.participants.len() as u32;
    for (position, p) in entry.participants.iter_mut().enumerate() {
        p.seed = count - position as u32;
    }
    entry.participants.sort_by_key(|p| p.seed);
    Ok(Json(Value::Array(
        entry
            .participants
            .iter()
            .map(|p| json!({ "participant": p }))
            .collect(),
    )))
}

// --- matches ---

fn match_index(entry: &Entry, raw: &str) -> Option<usize> {
    let id = trim_json(raw).parse::<u64>().ok()?;
    entry.matches.iter().position(|m| m.id == id)
}

async fn list_matches(
    State(db): State<Db>,
    Path(raw): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, Response> {
    let store = db.read().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store.tournaments.get(&key).ok_or_else(tournament_not_found)?;

    let participant_filter = query
        .get("participant_id")
        .and_then(|v| v.parse::<u64>().ok());
    let matches: Vec<Value> = entry
        .matches
        .iter()
        .filter(|m| match query.get("state") {
            Some(state) => &m.state == state,
            None => true,
        })
        .filter(|m| match participant_filter {
            Some(id) => m.player1_id == id || m.player2_id == id,
            None => true,
        })
        .map(|m| json!({ "match": m }))
        .collect();
    Ok(Json(Value::Array(matches)))
}

async fn get_match(
    State(db): State<Db>,
    Path((raw, mid)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, Response> {
    let store = db.read().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store.tournaments.get(&key).ok_or_else(tournament_not_found)?;
    let index = match_index(entry, &mid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "match not found"))?;

    let mut m = json!(entry.matches[index]);
    if query_flag(&query, "include_attachments") {
        let id = entry.matches[index].id;
        m["attachments"] = Value::Array(
            entry
                .attachments
                .iter()
                .filter(|a| a.match_id == id)
                .map(|a| json!({ "match_attachment": a }))
                .collect(),
        );
    }
    Ok(Json(json!({ "match": m })))
}

async fn update_match(
    State(db): State<Db>,
    Path((raw, mid)): Path<(String, String)>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let pairs = parse_pairs(&body);
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;
    let index = match_index(entry, &mid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "match not found"))?;

    let scores = field(&pairs, "match[scores_csv]");
    let winner = field(&pairs, "match[winner_id]");
    if winner.is_some() && scores.is_none() {
        return Err(unprocessable("scores_csv is required with winner_id"));
    }

    let m = &mut entry.matches[index];
    if let Some(scores) = scores {
        m.scores_csv = Some(scores.to_string());
    }
    if let Some(winner) = winner {
        m.winner_id = if winner == "tie" {
            Some(json!("tie"))
        } else {
            let id = winner
                .parse::<u64>()
                .map_err(|_| unprocessable("winner_id is invalid"))?;
            Some(json!(id))
        };
        m.state = "complete".to_string();
    }
    if let Some(votes) = field(&pairs, "match[player1_votes]") {
        m.player1_votes = Some(votes.parse().map_err(|_| unprocessable("player1_votes is invalid"))?);
    }
    if let Some(votes) = field(&pairs, "match[player2_votes]") {
        m.player2_votes = Some(votes.parse().map_err(|_| unprocessable("player2_votes is invalid"))?);
    }
    Ok(Json(json!({ "match": m })))
}

async fn reopen_match(
    State(db): State<Db>,
    Path((raw, mid)): Path<(String, String)>,
) -> Result<Json<Value>, Response> {
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;
    let index = match_index(entry, &mid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "match not found"))?;

    let m = &mut entry.matches[index];
    m.state = "open".to_string();
    m.winner_id = None;
    Ok(Json(json!({ "match": m })))
}

async fn mark_underway(
    State(db): State<Db>,
    Path((raw, mid)): Path<(String, String)>,
) -> Result<Json<Value>, Response> {
    set_underway(db, raw, mid, true).await
}

async fn unmark_underway(
    State(db): State<Db>,
    Path((raw, mid)): Path<(String, String)>,
) -> Result<Json<Value>, Response> {
    set_underway(db, raw, mid, false).await
}

async fn set_underway(
    db: Db,
    raw: String,
    mid: String,
    underway: bool,
) -> Result<Json<Value>, Response> {
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;
    let index = match_index(entry, &mid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "match not found"))?;
    entry.matches[index].underway_at = underway.then(now_string);
    Ok(Json(json!({ "match": entry.matches[index] })))
}

// --- attachments ---

fn attachment_index(entry: &Entry, match_id: u64, raw: &str) -> Option<usize> {
    let id = trim_json(raw).parse::<u64>().ok()?;
    entry
        .attachments
        .iter()
        .position(|a| a.id == id && a.match_id == match_id)
}

async fn list_attachments(
    State(db): State<Db>,
    Path((raw, mid)): Path<(String, String)>,
) -> Result<Json<Value>, Response> {
    let store = db.read().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store.tournaments.get(&key).ok_or_else(tournament_not_found)?;
    let index = match_index(entry, &mid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "match not found"))?;
    let id = entry.matches[index].id;
    Ok(Json(Value::Array(
        entry
            .attachments
            .iter()
            .filter(|a| a.match_id == id)
            .map(|a| json!({ "match_attachment": a }))
            .collect(),
    )))
}

async fn create_attachment(
    State(db): State<Db>,
    Path((raw, mid)): Path<(String, String)>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let pairs = parse_pairs(&body);
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;

    if !entry.tournament.accept_attachments {
        return Err(unprocessable("tournament does not accept attachments"));
    }
    let index = match_index(entry, &mid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "match not found"))?;
    let match_id = entry.matches[index].id;

    if entry.attachments.iter().filter(|a| a.match_id == match_id).count() >= 4 {
        return Err(unprocessable("a match can hold at most 4 attachments"));
    }

    let asset = field(&pairs, "match_attachment[asset]").map(str::to_string);
    // A file upload wins over a URL when both are supplied.
    let url = if asset.is_some() {
        None
    } else {
        field(&pairs, "match_attachment[url]").map(str::to_string)
    };
    let description = field(&pairs, "match_attachment[description]").map(str::to_string);
    if asset.is_none() && url.is_none() && description.is_none() {
        return Err(unprocessable("attachment needs an asset, url, or description"));
    }

    let id = entry.alloc();
    let attachment = Attachment {
        id,
        match_id,
        asset,
        url,
        description,
    };
    let rendered = json!({ "match_attachment": attachment });
    entry.attachments.push(attachment);
    Ok(Json(rendered))
}

async fn get_attachment(
    State(db): State<Db>,
    Path((raw, mid, aid)): Path<(String, String, String)>,
) -> Result<Json<Value>, Response> {
    let store = db.read().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store.tournaments.get(&key).ok_or_else(tournament_not_found)?;
    let match_id = mid
        .parse::<u64>()
        .map_err(|_| api_error(StatusCode::NOT_FOUND, "match not found"))?;
    let index = attachment_index(entry, match_id, &aid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "attachment not found"))?;
    Ok(Json(json!({ "match_attachment": entry.attachments[index] })))
}

async fn update_attachment(
    State(db): State<Db>,
    Path((raw, mid, aid)): Path<(String, String, String)>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, Response> {
    let pairs = parse_pairs(&body);
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;
    let match_id = mid
        .parse::<u64>()
        .map_err(|_| api_error(StatusCode::NOT_FOUND, "match not found"))?;
    let index = attachment_index(entry, match_id, &aid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "attachment not found"))?;

    let attachment = &mut entry.attachments[index];
    if let Some(asset) = field(&pairs, "match_attachment[asset]") {
        attachment.asset = Some(asset.to_string());
        attachment.url = None;
    } else if let Some(url) = field(&pairs, "match_attachment[url]") {
        attachment.url = Some(url.to_string());
    }
    if let Some(description) = field(&pairs, "match_attachment[description]") {
        attachment.description = Some(description.to_string());
    }
    Ok(Json(json!({ "match_attachment": attachment })))
}

async fn delete_attachment(
    State(db): State<Db>,
    Path((raw, mid, aid)): Path<(String, String, String)>,
) -> Result<Json<Value>, Response> {
    let mut store = db.write().await;
    let key = store
        .resolve(trim_json(&raw))
        .ok_or_else(tournament_not_found)?;
    let entry = store
        .tournaments
        .get_mut(&key)
        .ok_or_else(tournament_not_found)?;
    let match_id = mid
        .parse::<u64>()
        .map_err(|_| api_error(StatusCode::NOT_FOUND, "match not found"))?;
    let index = attachment_index(entry, match_id, &aid)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "attachment not found"))?;
    let removed = entry.attachments.remove(index);
    Ok(Json(json!({ "match_attachment": removed })))
}
