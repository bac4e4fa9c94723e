use super::*;
use crate::transport::LineStream;
use futures::stream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::Poll;

fn lines(raw: &[&str]) -> LineStream {
    let owned: Vec<Result<String, UpstreamError>> =
        raw.iter().map(|l| Ok(l.to_string())).collect();
    Box::pin(stream::iter(owned))
}

/// Lines followed by a stream that panics if anyone polls past them.
fn lines_then_tripwire(raw: &[&str]) -> LineStream {
    let tail = stream::poll_fn(|_| -> Poll<Option<Result<String, UpstreamError>>> {
        panic!("upstream polled after terminal frame")
    });
    Box::pin(lines(raw).chain(tail))
}

async fn frames(lines: LineStream) -> Vec<OutwardFrame> {
    translate(lines).collect().await
}

#[tokio::test]
async fn tokens_then_single_final_frame() {
    let out = frames(lines(&[
        r#"{"response":"Hel","done":false}"#,
        r#"{"response":"lo","done":false}"#,
        r#"{"response":"!","done":true}"#,
    ]))
    .await;

    assert_eq!(
        out,
        vec![
            OutwardFrame::token("Hel", false),
            OutwardFrame::token("lo", false),
            OutwardFrame::token("!", true),
            OutwardFrame::final_response("Hello!"),
        ]
    );
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let out = frames(lines(&[
        r#"{"response":"a","done":false}"#,
        "this is not json",
        r#"{"response":"b"#,
        r#"{"response":"c","done":true}"#,
    ]))
    .await;

    assert_eq!(
        out,
        vec![
            OutwardFrame::token("a", false),
            OutwardFrame::token("c", true),
            OutwardFrame::final_response("ac"),
        ]
    );
}

#[tokio::test]
async fn done_without_response_still_finalizes() {
    let out = frames(lines(&[
        r#"{"response":"Hi","done":false}"#,
        r#"{"done":true,"done_reason":"stop","eval_count":2}"#,
    ]))
    .await;

    assert_eq!(
        out,
        vec![
            OutwardFrame::token("Hi", false),
            OutwardFrame::final_response("Hi"),
        ]
    );
}

#[tokio::test]
async fn missing_done_defaults_to_false() {
    let out = frames(lines(&[r#"{"response":"x"}"#, r#"{"done":true}"#])).await;
    assert_eq!(out[0], OutwardFrame::token("x", false));
}

#[tokio::test]
async fn truthy_done_completes_and_is_echoed_on_the_token() {
    let out = frames(lines_then_tripwire(&[
        r#"{"response":"a","done":false}"#,
        r#"{"response":"b","done":1}"#,
    ]))
    .await;

    assert_eq!(
        out,
        vec![
            OutwardFrame::token("a", false),
            OutwardFrame::token("b", true),
            OutwardFrame::final_response("ab"),
        ]
    );
}

#[tokio::test]
async fn truthy_done_without_response_finalizes() {
    let out = frames(lines(&[
        r#"{"response":"a","done":0}"#,
        r#"{"done":"stop"}"#,
    ]))
    .await;

    assert_eq!(
        out,
        vec![
            OutwardFrame::token("a", false),
            OutwardFrame::final_response("a"),
        ]
    );
}

#[tokio::test]
async fn non_string_response_is_an_internal_fault() {
    let out = frames(lines_then_tripwire(&[
        r#"{"response":"a","done":false}"#,
        r#"{"response":null}"#,
    ]))
    .await;

    assert_eq!(
        out,
        vec![
            OutwardFrame::token("a", false),
            OutwardFrame::error(
                "Internal server error: upstream `response` is not a string (got null)"
            ),
        ]
    );
}

#[tokio::test]
async fn non_object_json_is_an_internal_fault() {
    for line in ["42", "[1,2,3]", r#""text""#] {
        let out = frames(lines_then_tripwire(&[r#"{"response":"a","done":false}"#, line])).await;

        assert_eq!(out.len(), 2, "{line}");
        assert_eq!(out[0], OutwardFrame::token("a", false));
        match &out[1] {
            OutwardFrame::Error { error } => assert!(
                error.starts_with("Internal server error: upstream line is not a JSON object"),
                "{line}: {error}"
            ),
            other => panic!("expected error frame for {line}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn nothing_is_consumed_after_completion() {
    let out = frames(lines_then_tripwire(&[
        r#"{"response":"ok","done":true}"#,
    ]))
    .await;

    assert_eq!(
        out,
        vec![
            OutwardFrame::token("ok", true),
            OutwardFrame::final_response("ok"),
        ]
    );
}

#[tokio::test]
async fn stream_end_without_completion_has_no_terminal_frame() {
    // Reproduced boundary: the relay just stops, no Final and no Error.
    let out = frames(lines(&[
        r#"{"response":"par","done":false}"#,
        r#"{"response":"tial","done":false}"#,
    ]))
    .await;

    assert_eq!(
        out,
        vec![
            OutwardFrame::token("par", false),
            OutwardFrame::token("tial", false),
        ]
    );
    assert!(out.iter().all(|f| !f.is_terminal()));
}

#[tokio::test]
async fn transport_error_becomes_single_error_frame() {
    let input: Vec<Result<String, UpstreamError>> = vec![
        Ok(r#"{"response":"A","done":false}"#.to_string()),
        Err(UpstreamError::Timeout),
        Ok(r#"{"response":"B","done":false}"#.to_string()),
    ];
    let out = frames(Box::pin(stream::iter(input))).await;

    assert_eq!(
        out,
        vec![
            OutwardFrame::token("A", false),
            OutwardFrame::error("Request timeout - AI model took too long to respond"),
        ]
    );
}

#[tokio::test]
async fn upstream_error_line_is_terminal() {
    let out = frames(lines_then_tripwire(&[
        r#"{"response":"A","done":false}"#,
        r#"{"error":"llama runner process has terminated"}"#,
    ]))
    .await;

    assert_eq!(
        out,
        vec![
            OutwardFrame::token("A", false),
            OutwardFrame::error("Ollama error: llama runner process has terminated"),
        ]
    );
}

#[tokio::test]
async fn panic_is_converted_to_internal_error_frame() {
    let out = frames(lines_then_tripwire(&[r#"{"response":"A","done":false}"#])).await;

    assert_eq!(out.len(), 2);
    assert_eq!(out[0], OutwardFrame::token("A", false));
    assert_eq!(
        out[1],
        OutwardFrame::error("Internal server error: upstream polled after terminal frame")
    );
}

#[tokio::test]
async fn upstream_is_released_at_terminal_frame() {
    struct DropFlag(Arc<AtomicBool>);
    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    let dropped = Arc::new(AtomicBool::new(false));
    let flag = DropFlag(dropped.clone());
    let upstream = lines(&[
        r#"{"response":"x","done":true}"#,
        r#"{"response":"never read","done":false}"#,
    ])
    .map(move |line| {
        let _keep = &flag;
        line
    });

    let mut out = translate(Box::pin(upstream));
    assert_eq!(out.next().await, Some(OutwardFrame::token("x", true)));
    assert!(dropped.load(Ordering::SeqCst), "upstream should be dropped once done is seen");
    assert_eq!(out.next().await, Some(OutwardFrame::final_response("x")));
    assert_eq!(out.next().await, None);
}

struct FixedBackend {
    calls: AtomicUsize,
    result: std::result::Result<Vec<&'static str>, UpstreamError>,
}

#[async_trait::async_trait]
impl GenerationBackend for FixedBackend {
    async fn open_stream(
        &self,
        _request: &GenerateRequest,
    ) -> std::result::Result<LineStream, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map(|raw| lines(&raw))
    }
}

fn request() -> GenerateRequest {
    GenerateRequest::new("tinyllama", "hi", Default::default())
}

#[tokio::test]
async fn relay_is_lazy_until_polled() {
    let backend = Arc::new(FixedBackend {
        calls: AtomicUsize::new(0),
        result: Ok(vec![r#"{"response":"a","done":true}"#]),
    });
    let frames = relay(backend.clone(), request(), Uuid::new_v4());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

    let out: Vec<_> = frames.collect().await;
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(out.last(), Some(&OutwardFrame::final_response("a")));
}

#[tokio::test]
async fn relay_open_failure_is_single_error_frame() {
    let backend = Arc::new(FixedBackend {
        calls: AtomicUsize::new(0),
        result: Err(UpstreamError::Rejected {
            status: 404,
            detail: "model 'tinyllama' not found".into(),
        }),
    });
    let out: Vec<_> = relay(backend, request(), Uuid::new_v4()).collect().await;
    assert_eq!(
        out,
        vec![OutwardFrame::error("Ollama error: model 'tinyllama' not found")]
    );
}

#[tokio::test]
async fn each_frame_is_available_as_soon_as_its_line_arrives() {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<String, UpstreamError>>(4);
    let upstream: LineStream = Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx));
    let mut frames = tokio_test::task::spawn(translate(upstream));

    tokio_test::assert_pending!(frames.poll_next());

    tx.send(Ok(r#"{"response":"first","done":false}"#.into()))
        .await
        .unwrap();
    assert_eq!(
        tokio_test::assert_ready!(frames.poll_next()),
        Some(OutwardFrame::token("first", false))
    );
    tokio_test::assert_pending!(frames.poll_next());

    tx.send(Err(UpstreamError::Timeout)).await.unwrap();
    assert_eq!(
        tokio_test::assert_ready!(frames.poll_next()),
        Some(OutwardFrame::error("Request timeout - AI model took too long to respond"))
    );
    assert_eq!(tokio_test::assert_ready!(frames.poll_next()), None);
    assert!(tx.is_closed(), "receiver should be dropped after the terminal frame");
}
