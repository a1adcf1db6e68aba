use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    Json,
};
use futures::{stream::once, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use answer_pipeline::ChatAnswer;
use retrieval_pipeline::is_greeting;

use crate::{api_state::ApiState, error::ApiError};

/// Fixed assistant reply for greeting-only messages; no resolution runs.
pub const GREETING_REPLY: &str = "\
สวัสดีค่ะ ยินดีให้บริการข้อมูลการเกษตรรายจังหวัด \
ลองถามได้เลย เช่น \"ข้อมูลข้าวของจังหวัดตาก\" หรือ \"เปรียบเทียบลำไย ตาก กับ น่าน\"";

#[derive(Debug, Deserialize)]
pub struct ChatParams {
    pub query: String,
}

/// Answer one chat query.
///
/// Greetings short-circuit to a fixed JSON reply. Grounded answers stream
/// as SSE: a `sources` event, then `chunk` events, then `done`. Generic
/// answers come back as plain JSON.
pub async fn chat(
    State(state): State<ApiState>,
    Json(params): Json<ChatParams>,
) -> Result<Response, ApiError> {
    let query = params.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::ValidationError(
            "query must not be empty".to_string(),
        ));
    }

    if is_greeting(&query) {
        return Ok(Json(json!({"kind": "greeting", "answer": GREETING_REPLY})).into_response());
    }

    info!(query_chars = query.chars().count(), "chat request");

    match state.service.resolve_and_answer(&query, None).await? {
        ChatAnswer::Generic { text } => {
            Ok(Json(json!({"kind": "generic", "answer": text})).into_response())
        }
        ChatAnswer::Grounded {
            stream,
            sources,
            report,
        } => {
            let head = once(async move {
                Event::default()
                    .event("sources")
                    .json_data(json!({"sources": sources, "report": report}))
            });
            let errored = Arc::new(AtomicBool::new(false));
            let body = {
                let errored = Arc::clone(&errored);
                stream.map(move |item| match item {
                    Ok(chunk) => Ok(Event::default().event("chunk").data(chunk)),
                    Err(err) => {
                        error!("mid-stream generation failure: {err}");
                        errored.store(true, Ordering::Relaxed);
                        Ok(Event::default()
                            .event("error")
                            .data(format!("Stream error: {err}")))
                    }
                })
            };
            // An interrupted answer must not end with the completion
            // marker, or clients would treat it as whole.
            let tail = once(async move {
                if errored.load(Ordering::Relaxed) {
                    None
                } else {
                    Some(Ok(Event::default().event("done").data("complete")))
                }
            })
            .filter_map(|item| async move { item });

            let events = head.chain(body).chain(tail).boxed();
            Ok(Sse::new(events)
                .keep_alive(
                    KeepAlive::new()
                        .interval(Duration::from_secs(15))
                        .text("keep-alive"),
                )
                .into_response())
        }
    }
}
