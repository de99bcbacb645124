use axum::http::{self, Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http_body_util::BodyExt;
use mock_server::{app, API_KEY, API_USER, AUTH_DENIED_BODY};
use serde_json::Value;
use tower::ServiceExt;

fn auth_value() -> String {
    format!("Basic {}", BASE64.encode(format!("{API_USER}:{API_KEY}")))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn form_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, auth_value())
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body.to_string())
        .unwrap()
}

fn get_request(uri: &str) -> Request<String> {
    Request::builder()
        .uri(uri)
        .header(http::header::AUTHORIZATION, auth_value())
        .body(String::new())
        .unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_credentials_return_basic_challenge() {
    let app = app();
    let resp = app
        .oneshot(Request::builder().uri("/").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_bytes(resp).await;
    assert_eq!(body, AUTH_DENIED_BODY.as_bytes());
}

#[tokio::test]
async fn wrong_key_is_rejected() {
    let app = app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/tournaments.json")
                .header(
                    http::header::AUTHORIZATION,
                    format!("Basic {}", BASE64.encode(format!("{API_USER}:nope"))),
                )
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn heartbeat_answers_with_credentials() {
    let app = app();
    let resp = app.oneshot(get_request("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- tournaments ---

#[tokio::test]
async fn create_tournament_wraps_the_envelope() {
    let app = app();
    let resp = app
        .oneshot(form_request(
            "POST",
            "/tournaments.json",
            "tournament%5Bname%5D=Spring%20Cup&tournament%5Bprivate%5D=false",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["tournament"]["name"], "Spring Cup");
    assert_eq!(body["tournament"]["state"], "pending");
    assert_eq!(body["tournament"]["private"], false);
}

#[tokio::test]
async fn overlong_name_returns_errors_array() {
    let app = app();
    let name = "x".repeat(61);
    let resp = app
        .oneshot(form_request(
            "POST",
            "/tournaments.json",
            &format!("tournament%5Bname%5D={name}"),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert!(body["errors"][0].as_str().unwrap().contains("60 characters"));
}

#[tokio::test]
async fn unknown_tournament_returns_404() {
    let app = app();
    let resp = app.oneshot(get_request("/tournaments/999.json")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert!(body["errors"].is_array());
}

// --- participants ---

#[tokio::test]
async fn bulk_add_treats_names_and_invites_independently() {
    use tower::Service;
    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("POST", "/tournaments.json", ""))
        .await
        .unwrap();
    let id = body_json(resp).await["tournament"]["id"].as_u64().unwrap();

    let body = "participants%5B%5D%5Bname%5D=a&participants%5B%5D%5Bname%5D=b\
                &participants%5B%5D%5Binvite_name_or_email%5D=c%40example.com\
                &participants%5B%5D%5Binvite_name_or_email%5D=d%40example.com\
                &participants%5B%5D%5Binvite_name_or_email%5D=e%40example.com";
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/tournaments/{id}/participants/bulk_add.json"),
            body,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let added = body_json(resp).await;
    assert_eq!(added.as_array().unwrap().len(), 5);
    assert_eq!(added[0]["participant"]["name"], "a");
    assert_eq!(added[2]["participant"]["name"], "c@example.com");
}

#[tokio::test]
async fn clear_reports_how_many_were_removed() {
    use tower::Service;
    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("POST", "/tournaments.json", ""))
        .await
        .unwrap();
    let id = body_json(resp).await["tournament"]["id"].as_u64().unwrap();

    for name in ["a", "b", "c"] {
        ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(form_request(
                "POST",
                &format!("/tournaments/{id}/participants.json"),
                &format!("participant%5Bname%5D={name}"),
            ))
            .await
            .unwrap();
    }

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "DELETE",
            &format!("/tournaments/{id}/participants/clear.json"),
            "",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "Cleared 3 participants");
}

// --- lifecycle ---

#[tokio::test]
async fn start_requires_two_participants() {
    use tower::Service;
    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("POST", "/tournaments.json", ""))
        .await
        .unwrap();
    let id = body_json(resp).await["tournament"]["id"].as_u64().unwrap();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/tournaments/{id}/start.json"),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn full_bracket_lifecycle() {
    use tower::Service;
    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            "/tournaments.json",
            "tournament%5Bname%5D=finals&tournament%5Burl%5D=mock_finals",
        ))
        .await
        .unwrap();
    let id = body_json(resp).await["tournament"]["id"].as_u64().unwrap();

    for name in ["mia", "ned"] {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(form_request(
                "POST",
                &format!("/tournaments/{id}/participants.json"),
                &format!("participant%5Bname%5D={name}"),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    // slug resolution on the way in, one open round-one match on the way out
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            "/tournaments/mock_finals/start.json?include_matches=1",
            "",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let started = body_json(resp).await;
    assert_eq!(started["tournament"]["state"], "underway");
    let matches = started["tournament"]["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["match"]["state"], "open");
    let match_id = matches[0]["match"]["id"].as_u64().unwrap();
    let winner = matches[0]["match"]["player1_id"].as_u64().unwrap();

    // winner without scores is rejected
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "PUT",
            &format!("/tournaments/{id}/matches/{match_id}.json"),
            &format!("match%5Bwinner_id%5D={winner}"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "PUT",
            &format!("/tournaments/{id}/matches/{match_id}.json"),
            &format!("match%5Bscores_csv%5D=3-1&match%5Bwinner_id%5D={winner}"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let scored = body_json(resp).await;
    assert_eq!(scored["match"]["state"], "complete");
    assert_eq!(scored["match"]["scores_csv"], "3-1");

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/tournaments/{id}/finalize.json"),
            "",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let done = body_json(resp).await;
    assert_eq!(done["tournament"]["state"], "complete");

    // reset drops the bracket and reopens registration
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/tournaments/{id}/reset.json?include_matches=1"),
            "",
        ))
        .await
        .unwrap();
    let reset = body_json(resp).await;
    assert_eq!(reset["tournament"]["state"], "pending");
    assert!(reset["tournament"]["matches"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn lifecycle_posts_read_include_flags_from_the_form_body() {
    use tower::Service;
    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("POST", "/tournaments.json", ""))
        .await
        .unwrap();
    let id = body_json(resp).await["tournament"]["id"].as_u64().unwrap();

    for name in ["mia", "ned"] {
        ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(form_request(
                "POST",
                &format!("/tournaments/{id}/participants.json"),
                &format!("participant%5Bname%5D={name}"),
            ))
            .await
            .unwrap();
    }

    // Flags travel form-encoded in the body, not in the query string.
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/tournaments/{id}/process_check_ins.json"),
            "include_participants=1",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let processed = body_json(resp).await;
    assert_eq!(
        processed["tournament"]["participants"]
            .as_array()
            .unwrap()
            .len(),
        2
    );

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/tournaments/{id}/abort_check_in.json"),
            "include_participants=1",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let aborted = body_json(resp).await;
    let participants = aborted["tournament"]["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 2);
    for wrapped in participants {
        assert_eq!(wrapped["participant"]["active"], true);
    }

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/tournaments/{id}/start.json"),
            "include_matches=1",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let started = body_json(resp).await;
    assert_eq!(
        started["tournament"]["matches"].as_array().unwrap().len(),
        1
    );
}

#[tokio::test]
async fn attachments_require_opt_in() {
    use tower::Service;
    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("POST", "/tournaments.json", ""))
        .await
        .unwrap();
    let id = body_json(resp).await["tournament"]["id"].as_u64().unwrap();

    for name in ["a", "b"] {
        ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(form_request(
                "POST",
                &format!("/tournaments/{id}/participants.json"),
                &format!("participant%5Bname%5D={name}"),
            ))
            .await
            .unwrap();
    }
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/tournaments/{id}/start.json?include_matches=1"),
            "",
        ))
        .await
        .unwrap();
    let started = body_json(resp).await;
    let match_id = started["tournament"]["matches"][0]["match"]["id"]
        .as_u64()
        .unwrap();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/tournaments/{id}/matches/{match_id}/attachments.json"),
            "match_attachment%5Burl%5D=https%3A%2F%2Fexample.com",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "PUT",
            &format!("/tournaments/{id}.json"),
            "tournament%5Baccept_attachments%5D=true",
        ))
        .await
        .unwrap();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/tournaments/{id}/matches/{match_id}/attachments.json"),
            "match_attachment%5Burl%5D=https%3A%2F%2Fexample.com&match_attachment%5Bdescription%5D=vod",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created = body_json(resp).await;
    assert_eq!(created["match_attachment"]["description"], "vod");
}
