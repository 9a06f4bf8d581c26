mod common;

use common::*;
use dacp_link::{
    DacpLinkError, DacpLinkTimeouts, FacadeState, HttpReply, ResultCode, ResultHandle, RowStream,
    TypedValue,
};
use std::time::Duration;

async fn open_cursor(transport: &std::sync::Arc<ScriptedTransport>, page_size: u32) -> (dacp_link::DacpLinkClient, RowStream) {
    // ahead of any re-login replies the test scripted
    transport.push_front_json(LOGIN, login_ok("tok-1"));
    transport.push_json(EXECUTE, execute_ok("t-1", "cursor"));

    let client = client(transport.clone(), page_size);
    match client.run_query("SELECT id FROM big").await.unwrap() {
        ResultHandle::Cursor(stream) => (client, stream),
        other => panic!("expected cursor, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_pages_until_total_is_reached() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page(1, 10, 25, 1, 10));
    transport.push_json(RESULT, page(2, 10, 25, 11, 10));
    transport.push_json(RESULT, page(3, 10, 25, 21, 5));

    let (client, mut stream) = open_cursor(&transport, 10).await;
    assert_eq!(client.state(), FacadeState::CursorStreaming);

    let mut sizes = Vec::new();
    while let Some(page) = stream.next_page().await {
        sizes.push(page.unwrap().row_count());
    }

    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(stream.pages_fetched(), 3);
    assert_eq!(stream.total(), Some(25));
    let requested: Vec<u64> = transport
        .calls_to(RESULT)
        .iter()
        .map(|c| c.body["pageNum"].as_u64().unwrap())
        .collect();
    assert_eq!(requested, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_rows_are_coerced_in_order() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page(1, 10, 25, 1, 10));
    transport.push_json(RESULT, page(2, 10, 25, 11, 10));
    transport.push_json(RESULT, page(3, 10, 25, 21, 5));

    let (_client, stream) = open_cursor(&transport, 10).await;
    let rows = stream.collect_rows().await.unwrap();

    let ids: Vec<TypedValue> = rows.into_iter().map(|mut r| r.remove(0)).collect();
    let expected: Vec<TypedValue> = (1..=25).map(TypedValue::BigInt).collect();
    assert_eq!(ids, expected);
}

#[tokio::test(start_paused = true)]
async fn test_requests_are_spaced_by_interval() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page(1, 10, 30, 1, 10));
    transport.push_json(RESULT, page(2, 10, 30, 11, 10));
    transport.push_json(RESULT, page(3, 10, 30, 21, 10));

    let (_client, stream) = open_cursor(&transport, 10).await;
    stream.collect_rows().await.unwrap();

    let submitted_at = transport.calls_to(EXECUTE)[0].at;
    let fetches = transport.calls_to(RESULT);
    assert!(fetches[0].at - submitted_at < Duration::from_secs(1), "first page is not delayed");
    for pair in fetches.windows(2) {
        assert!(pair[1].at - pair[0].at >= Duration::from_secs(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_empty_stream_when_total_is_zero() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page(1, 10, 0, 1, 0));

    let (_client, mut stream) = open_cursor(&transport, 10).await;
    assert!(stream.next().await.is_none());
    assert_eq!(transport.calls_to(RESULT).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_running_and_empty_pages_are_polled_again() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page_code("001", "Running."));
    transport.push_json(RESULT, page(1, 10, 5, 1, 0));
    transport.push_json(RESULT, page(1, 10, 5, 1, 5));

    let (_client, stream) = open_cursor(&transport, 10).await;
    let rows = stream.collect_rows().await.unwrap();

    assert_eq!(rows.len(), 5);
    let fetches = transport.calls_to(RESULT);
    assert_eq!(fetches.len(), 3);
    assert!(fetches.iter().all(|c| c.body["pageNum"] == 1));
}

#[tokio::test(start_paused = true)]
async fn test_token_expired_relogs_once_and_retries_with_new_token() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page(1, 10, 20, 1, 10));
    transport.push_json(RESULT, page_code("700", "Token expired error."));
    transport.push_json(LOGIN, login_ok("tok-2"));
    transport.push_json(RESULT, page(2, 10, 20, 11, 10));

    let (client, stream) = open_cursor(&transport, 10).await;
    let rows = stream.collect_rows().await.unwrap();

    assert_eq!(rows.len(), 20);
    assert_eq!(transport.calls_to(LOGIN).len(), 2);

    let fetches = transport.calls_to(RESULT);
    assert_eq!(fetches.len(), 3);
    assert_eq!(fetches[1].body["pageNum"], 2);
    assert_eq!(fetches[1].body["accessToken"], "tok-1");
    assert_eq!(fetches[2].body["pageNum"], 2);
    assert_eq!(fetches[2].body["accessToken"], "tok-2");
    assert_eq!(client.session().access_token.as_deref(), Some("tok-2"));
}

#[tokio::test(start_paused = true)]
async fn test_refreshed_token_is_kept_for_later_pages() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page_code("700", "expired"));
    transport.push_json(LOGIN, login_ok("tok-2"));
    transport.push_json(RESULT, page(1, 10, 30, 1, 10));
    transport.push_json(RESULT, page(2, 10, 30, 11, 10));
    transport.push_json(RESULT, page_code("700", "expired again"));
    transport.push_json(LOGIN, login_ok("tok-3"));
    transport.push_json(RESULT, page(3, 10, 30, 21, 10));

    let (_client, stream) = open_cursor(&transport, 10).await;
    assert_eq!(stream.collect_rows().await.unwrap().len(), 30);

    let tokens: Vec<String> = transport
        .calls_to(RESULT)
        .iter()
        .map(|c| c.body["accessToken"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(tokens, vec!["tok-1", "tok-2", "tok-2", "tok-2", "tok-3"]);
}

#[tokio::test(start_paused = true)]
async fn test_second_token_expiry_is_a_cursor_error() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page_code("700", "Token expired error."));
    transport.push_json(LOGIN, login_ok("tok-2"));
    transport.push_json(RESULT, page_code("700", "Token expired error."));

    let (_client, mut stream) = open_cursor(&transport, 10).await;
    match stream.next().await {
        Some(Err(DacpLinkError::CursorError { code, .. })) => assert_eq!(code, ResultCode::TokenExpired),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(stream.next().await.is_none(), "stream is fused after an error");

    assert_eq!(transport.calls_to(LOGIN).len(), 2);
    assert_eq!(transport.calls_to(RESULT).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_code_after_partial_consumption() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page(1, 2, 10, 1, 2));
    transport.push_json(RESULT, page_code("300", "worker lost"));

    let (_client, mut stream) = open_cursor(&transport, 2).await;
    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.unwrap().is_ok());

    match stream.next().await {
        Some(Err(DacpLinkError::CursorError { code, message })) => {
            assert_eq!(code, ResultCode::SqlExecuteError);
            assert_eq!(message, "worker lost");
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_task_timeout_while_not_ready() {
    let transport = ScriptedTransport::new();
    for _ in 0..60 {
        transport.push_json(RESULT, page_code("001", "Running."));
    }

    let (_client, mut stream) = open_cursor(&transport, 10).await;
    assert!(matches!(stream.next().await, Some(Err(DacpLinkError::TimeoutError(_)))));
    assert!(stream.next().await.is_none());

    let fetches = transport.calls_to(RESULT).len();
    assert!((29..=31).contains(&fetches), "polled {} times", fetches);
}

#[tokio::test(start_paused = true)]
async fn test_slow_page_hits_task_timeout() {
    let transport = ScriptedTransport::new();
    transport.push(
        RESULT,
        Step::Delayed(
            Duration::from_secs(120),
            dacp_link::HttpReply::ok_json(&page(1, 10, 5, 1, 5)),
        ),
    );

    let (_client, mut stream) = open_cursor(&transport, 10).await;
    assert!(matches!(stream.next().await, Some(Err(DacpLinkError::TimeoutError(_)))));
}

#[tokio::test(start_paused = true)]
async fn test_total_change_is_a_cursor_error() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page(1, 10, 30, 1, 10));
    transport.push_json(RESULT, page(2, 10, 40, 11, 10));

    let (_client, mut stream) = open_cursor(&transport, 10).await;
    assert!(stream.next_page().await.unwrap().is_ok());
    assert!(matches!(
        stream.next_page().await,
        Some(Err(DacpLinkError::CursorError { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_page_number_mismatch_is_a_cursor_error() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page(2, 10, 30, 11, 10));

    let (_client, mut stream) = open_cursor(&transport, 10).await;
    assert!(matches!(
        stream.next_page().await,
        Some(Err(DacpLinkError::CursorError { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_http_failure_on_page_is_transport_error() {
    let transport = ScriptedTransport::new();
    transport.push_status(RESULT, 500, "internal error");

    let (_client, mut stream) = open_cursor(&transport, 10).await;
    assert!(matches!(
        stream.next().await,
        Some(Err(DacpLinkError::TransportError { status: Some(500), .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_open_streams() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page(1, 10, 30, 1, 10));
    transport.push_json(RESULT, page(2, 10, 30, 11, 10));

    let (client, mut stream) = open_cursor(&transport, 10).await;
    assert!(stream.next_page().await.unwrap().is_ok());

    client.close();
    assert!(stream.next_page().await.is_none());
    assert_eq!(transport.calls_to(RESULT).len(), 1);
    assert!(matches!(client.run_query("SELECT 1").await, Err(DacpLinkError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_stream_stops_requests() {
    let transport = ScriptedTransport::new();
    transport.push_json(RESULT, page(1, 10, 30, 1, 10));
    transport.push_json(RESULT, page(2, 10, 30, 11, 10));

    let (_client, mut stream) = open_cursor(&transport, 10).await;
    stream.next_page().await.unwrap().unwrap();
    drop(stream);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.calls_to(RESULT).len(), 1);
    assert_eq!(transport.remaining(RESULT), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_page_is_a_single_request() {
    let transport = ScriptedTransport::new();
    transport.push_json(LOGIN, login_ok("tok-1"));
    transport.push_json(RESULT, page(3, 10, 25, 21, 5));

    let client = client(transport.clone(), 10);
    let page = client.fetch_page("t-9", 3, 10).await.unwrap();

    assert_eq!(page.row_count(), 5);
    assert_eq!(page.page_num, 3);
    assert_eq!(page.column_names(), vec!["id".to_string()]);
    assert_eq!(transport.calls_to(RESULT)[0].body["taskId"], "t-9");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_cursors_each_relogin_once() {
    let transport = ScriptedTransport::new();
    transport.push_json(LOGIN, login_ok("tok-1"));
    transport.push_json(EXECUTE, execute_ok("t-a", "cursor"));
    transport.push_json(EXECUTE, execute_ok("t-b", "cursor"));
    // both first fetches are in flight before either sees the 700
    for _ in 0..2 {
        transport.push(
            RESULT,
            Step::Delayed(
                Duration::from_millis(200),
                HttpReply::ok_json(&page_code("700", "Token expired error.")),
            ),
        );
    }
    transport.push_json(LOGIN, login_ok("tok-2"));
    transport.push_json(LOGIN, login_ok("tok-3"));
    transport.push_json(RESULT, page(1, 10, 3, 1, 3));
    transport.push_json(RESULT, page(1, 10, 3, 1, 3));

    let client = client(transport.clone(), 10);
    let streams = (
        client.run_query("SELECT id FROM a").await.unwrap(),
        client.run_query("SELECT id FROM b").await.unwrap(),
    );
    let (ResultHandle::Cursor(a), ResultHandle::Cursor(b)) = streams else {
        panic!("expected two cursors");
    };

    let (rows_a, rows_b) = tokio::join!(a.collect_rows(), b.collect_rows());
    assert_eq!(rows_a.unwrap().len(), 3);
    assert_eq!(rows_b.unwrap().len(), 3);

    assert_eq!(transport.calls_to(LOGIN).len(), 3);
    let fetches = transport.calls_to(RESULT);
    assert_eq!(fetches.len(), 4);

    for task in ["t-a", "t-b"] {
        let tokens: Vec<&str> = fetches
            .iter()
            .filter(|c| c.body["taskId"] == task)
            .map(|c| c.body["accessToken"].as_str().unwrap())
            .collect();
        assert_eq!(tokens.len(), 2, "one retry for {}", task);
        assert_eq!(tokens[0], "tok-1");
        assert_ne!(tokens[1], "tok-1");
    }

    let mut retried: Vec<&str> = fetches[2..]
        .iter()
        .map(|c| c.body["accessToken"].as_str().unwrap())
        .collect();
    retried.sort();
    assert_eq!(retried, vec!["tok-2", "tok-3"], "each stream uses its own refresh");
    assert_eq!(transport.remaining(LOGIN), 0);
}

#[tokio::test(start_paused = true)]
async fn test_task_deadline_starts_at_submission() {
    let transport = ScriptedTransport::new();
    transport.push(
        LOGIN,
        Step::Delayed(Duration::from_secs(3), HttpReply::ok_json(&login_ok("tok-1"))),
    );
    transport.push_json(EXECUTE, execute_ok("t-1", "cursor"));
    transport.push_json(RESULT, page(1, 10, 3, 1, 3));

    let client = builder(transport.clone())
        .page_size(10)
        .timeouts(DacpLinkTimeouts::builder().task_timeout_secs(2).build())
        .build()
        .unwrap();

    let rows = client
        .run_query("SELECT id FROM t")
        .await
        .unwrap()
        .collect_rows()
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);

    let login_at = transport.calls_to(LOGIN)[0].at;
    let submitted_at = transport.calls_to(EXECUTE)[0].at;
    assert!(submitted_at - login_at >= Duration::from_secs(3));
}
