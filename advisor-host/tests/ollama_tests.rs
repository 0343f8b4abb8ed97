mod mocks;

use advisor_host::{
    ControllerConfig, ConversationMessage, EventEmitter, EventKind, OllamaTokenSource,
    ProviderRegistry, Role, SourceError, StreamDelta, TokenSource, ToolDispatcher,
    TurnController, TurnState,
};
use futures::StreamExt;
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn ndjson(parts: &[&str]) -> String {
    let mut body = String::new();
    for part in parts {
        let line = json!({"model": "advisor", "message": {"role": "assistant", "content": part}, "done": false});
        body.push_str(&line.to_string());
        body.push('\n');
    }
    let last = json!({"model": "advisor", "message": {"role": "assistant", "content": ""}, "done": true});
    body.push_str(&last.to_string());
    body.push('\n');
    body
}

#[tokio::test]
async fn test_streams_deltas_until_done() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "advisor",
            "stream": true,
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "hi"},
                {"role": "tool", "content": "[geocode] 1,2"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(ndjson(&["<answer>he", "llo</answer>"]))
        .create_async()
        .await;

    let source = OllamaTokenSource::with_config("advisor", &server.url(), Duration::from_secs(5));
    let history = vec![
        ConversationMessage::new(Role::User, "hi"),
        ConversationMessage::new(Role::ToolResult, "[geocode] 1,2"),
    ];
    let stream = source.open("Be brief.", &history).await.unwrap();
    let deltas: Vec<_> = stream.collect().await;

    mock.assert_async().await;
    assert_eq!(
        deltas,
        vec![
            Ok(StreamDelta::text("<answer>he")),
            Ok(StreamDelta::text("llo</answer>")),
            Ok(StreamDelta::last("")),
        ]
    );
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(404)
        .with_body(r#"{"error":"model 'advisor' not found"}"#)
        .create_async()
        .await;

    let source = OllamaTokenSource::with_config("advisor", &server.url(), Duration::from_secs(5));
    let err = match source.open("", &[]).await {
        Ok(_) => panic!("expected an error status"),
        Err(e) => e,
    };
    assert!(matches!(err, SourceError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_error_line_ends_stream_with_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body("{\"message\":{\"content\":\"<thinking>\"},\"done\":false}\n{\"error\":\"out of memory\"}\n")
        .create_async()
        .await;

    let source = OllamaTokenSource::with_config("advisor", &server.url(), Duration::from_secs(5));
    let deltas: Vec<_> = source.open("", &[]).await.unwrap().collect().await;
    assert_eq!(deltas.len(), 2);
    assert_eq!(
        deltas[1],
        Err(SourceError::Stream("out of memory".to_string()))
    );
}

#[tokio::test]
async fn test_unreachable_server() {
    let source =
        OllamaTokenSource::with_config("advisor", "http://127.0.0.1:1", Duration::from_secs(2));
    assert!(matches!(
        source.open("", &[]).await,
        Err(SourceError::Unreachable(_))
    ));
}

#[tokio::test]
async fn test_controller_over_http_source() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(ndjson(&[
            "<thinking>simple question</thinking>",
            "<answer>Yes, rolling admissions ",
            "are open.</answer>",
        ]))
        .create_async()
        .await;

    let source = Arc::new(OllamaTokenSource::with_config(
        "advisor",
        &server.url(),
        Duration::from_secs(5),
    ));
    let (emitter, rx) = EventEmitter::channel(16);
    let controller = TurnController::new(
        source,
        ToolDispatcher::new(ProviderRegistry::new()),
        ControllerConfig::default(),
        emitter,
    );
    let outcome = controller.run("Are admissions open?").await;
    let events = mocks::collect_events(rx).await;

    assert_eq!(outcome.state, TurnState::Done);
    assert_eq!(
        mocks::kinds(&events),
        vec![EventKind::Thinking, EventKind::Response, EventKind::Complete]
    );
    assert_eq!(
        events[1].content.as_deref(),
        Some("Yes, rolling admissions are open.")
    );
}
