use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use quizzit_back::{
    config::AppConfig,
    dao::{
        models::{OptionEntity, QuestionEntity, QuestionSetEntity},
        session_store::memory::MemoryStore,
    },
    routes,
    state::{AppState, storage::StorageHandle},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn question_set() -> QuestionSetEntity {
    QuestionSetEntity {
        id: Uuid::new_v4(),
        title: "Capitals".into(),
        questions: ["France", "Spain"]
            .into_iter()
            .enumerate()
            .map(|(order, country)| QuestionEntity {
                id: format!("q{order}"),
                order: order as u32,
                text: format!("Capital of {country}?"),
                options: ["a", "b", "c"]
                    .into_iter()
                    .map(|id| OptionEntity {
                        id: id.into(),
                        text: id.to_uppercase(),
                    })
                    .collect(),
                correct_option_id: "a".into(),
                duration_seconds: 20,
            })
            .collect(),
    }
}

fn app() -> (Router, Uuid) {
    let set = question_set();
    let set_id = set.id;
    let store = MemoryStore::with_question_sets([set]);
    let storage = Arc::new(StorageHandle::with_store(Arc::new(store)));
    let state = AppState::with_storage(AppConfig::default(), storage);
    (routes::router(state), set_id)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn host_post(uri: &str, host_id: &str) -> Request<Body> {
    Request::post(uri)
        .header("x-host-id", host_id)
        .body(Body::empty())
        .unwrap()
}

fn answer(uri: &str, player_id: &str, option_id: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-player-id", player_id)
        .body(Body::from(
            json!({"question_id": "q0", "option_id": option_id, "response_time_ms": 4000})
                .to_string(),
        ))
        .unwrap()
}

/// Create a session and join one player; returns `(session_id, pin, player_id)`.
async fn lobby(app: &Router, set_id: Uuid) -> (String, String, String) {
    let (status, created) = call(
        app,
        post_json(
            "/sessions",
            json!({"question_set_id": set_id, "host_id": "host-1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let session_id = created["session_id"].as_str().unwrap().to_owned();
    let pin = created["pin"].as_str().unwrap().to_owned();

    let (status, joined) = call(
        app,
        post_json("/sessions/join", json!({"pin": pin, "nickname": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(joined["observer"], false);
    let player_id = joined["player_id"].as_str().unwrap().to_owned();

    (session_id, pin, player_id)
}

#[tokio::test]
async fn healthcheck_reports_ok_with_memory_store() {
    let (app, _) = app();
    let (status, body) = call(
        &app,
        Request::get("/healthcheck").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn question_sets_are_listed() {
    let (app, set_id) = app();
    let (status, body) = call(
        &app,
        Request::get("/question-sets").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], set_id.to_string());
}

#[tokio::test]
async fn a_round_is_played_over_http() {
    let (app, set_id) = app();
    let (session_id, pin, player_id) = lobby(&app, set_id).await;

    let (status, phase) = call(
        &app,
        host_post(&format!("/sessions/{session_id}/start"), "host-1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(phase["status"], "question_active");

    let (status, view) = call(
        &app,
        Request::get(format!("/sessions/pin/{pin}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["current_question"]["question_id"], "q0");
    assert!(view["current_question"].get("correct_option_id").is_none());

    let (status, verdict) = call(
        &app,
        answer(&format!("/sessions/{session_id}/answers"), &player_id, "a"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verdict["is_correct"], true);
    assert_eq!(verdict["score_awarded"], 900);

    let (status, _) = call(
        &app,
        answer(&format!("/sessions/{session_id}/answers"), &player_id, "b"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, board) = call(
        &app,
        Request::get(format!("/sessions/{session_id}/leaderboard"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["entries"][0]["score"], 900);
    assert_eq!(board["entries"][0]["rank"], 1);

    let (status, phase) = call(
        &app,
        host_post(&format!("/sessions/{session_id}/advance"), "host-1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(phase["question_index"], 1);
}

#[tokio::test]
async fn host_commands_require_the_host_identity() {
    let (app, set_id) = app();
    let (session_id, _, _) = lobby(&app, set_id).await;
    let uri = format!("/sessions/{session_id}/start");

    let (status, body) = call(&app, Request::post(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().contains("x-host-id"));

    let (status, _) = call(&app, host_post(&uri, "intruder")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn answers_outside_a_question_are_refused() {
    let (app, set_id) = app();
    let (session_id, _, player_id) = lobby(&app, set_id).await;

    let (status, _) = call(
        &app,
        answer(&format!("/sessions/{session_id}/answers"), &player_id, "a"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        answer(
            &format!("/sessions/{session_id}/answers"),
            &Uuid::new_v4().to_string(),
            "a",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_joins_are_rejected() {
    let (app, _) = app();

    let (status, _) = call(
        &app,
        post_json("/sessions/join", json!({"pin": "12a", "nickname": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        post_json("/sessions/join", json!({"pin": "000000", "nickname": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn aborted_sessions_refuse_new_players() {
    let (app, set_id) = app();
    let (session_id, pin, _) = lobby(&app, set_id).await;

    let (status, phase) = call(
        &app,
        host_post(&format!("/sessions/{session_id}/abort"), "host-1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(phase["status"], "finished");

    let (status, _) = call(
        &app,
        post_json("/sessions/join", json!({"pin": pin, "nickname": "Bob"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn event_streams_open_for_known_players_only() {
    let (app, set_id) = app();
    let (session_id, _, player_id) = lobby(&app, set_id).await;

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/sessions/{session_id}/events?playerId={player_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    drop(response);

    let response = app
        .oneshot(
            Request::get(format!(
                "/sessions/{session_id}/events?playerId={}",
                Uuid::new_v4()
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_sessions_are_not_found() {
    let (app, _) = app();
    let (status, body) = call(
        &app,
        Request::get(format!("/sessions/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].is_string());
}
