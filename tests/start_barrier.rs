mod common;

use std::sync::Arc;
use std::thread;

use common::{Recorded, RecordingSink};
use rustygate::{CancellationToken, CookieOptions, Response, ResponseError};

fn attach(response: &Response, sink: &Arc<RecordingSink>) {
    response
        .attach(sink.clone(), CancellationToken::new())
        .unwrap();
}

#[test]
fn buffered_writes_wait_for_start_then_replay_in_order() {
    let response = Response::new();
    response.set_buffering(true);
    response.set_header("Content-Type", "text/plain");
    assert!(response.write(b"hello").unwrap());
    assert!(response.write(b" world").unwrap());

    let sink = RecordingSink::new();
    attach(&response, &sink);
    // buffering holds everything until something requests the start
    assert!(sink.events().is_empty());
    assert!(!response.is_started());

    response.end();

    let events = sink.events();
    assert_eq!(events.len(), 4);
    match &events[0] {
        Recorded::Commit { status, headers } => {
            assert_eq!(status, "200 OK");
            assert_eq!(headers.get("content-type").as_deref(), Some("text/plain"));
        }
        other => panic!("expected commit first, got {other:?}"),
    }
    assert_eq!(events[1], Recorded::Data(b"hello".to_vec()));
    assert_eq!(events[2], Recorded::Data(b" world".to_vec()));
    assert_eq!(events[3], Recorded::End(None));
}

#[test]
fn unbuffered_write_before_attach_starts_and_replays_once() {
    let response = Response::new();
    assert!(response.write(b"x").unwrap());
    assert!(response.is_started());
    assert!(!response.is_committed());

    let sink = RecordingSink::new();
    attach(&response, &sink);

    assert_eq!(sink.commits(), 1);
    assert_eq!(sink.data(), vec![b"x".to_vec()]);

    response.end();
    assert_eq!(sink.data(), vec![b"x".to_vec()]);
    assert_eq!(sink.ends(), 1);
}

#[test]
fn unbuffered_first_write_starts_synchronously() {
    let response = Response::new();
    let sink = RecordingSink::new();
    attach(&response, &sink);
    assert_eq!(sink.commits(), 0);

    response.write(b"now").unwrap();
    assert_eq!(sink.commits(), 1);
    assert_eq!(sink.data(), vec![b"now".to_vec()]);
}

#[test]
fn flush_always_forces_start() {
    let response = Response::new();
    response.set_buffering(true);
    let sink = RecordingSink::new();
    attach(&response, &sink);

    response.write(b"held").unwrap();
    assert_eq!(sink.commits(), 0);

    response.flush().unwrap();
    assert_eq!(sink.commits(), 1);
    assert_eq!(
        sink.events()[1..],
        [Recorded::Data(b"held".to_vec()), Recorded::Flush]
    );
}

#[test]
fn disabling_buffering_lets_next_write_start() {
    let response = Response::new();
    response.set_buffering(true);
    let sink = RecordingSink::new();
    attach(&response, &sink);

    response.write(b"a").unwrap();
    response.set_buffering(false);
    assert_eq!(sink.commits(), 0);

    response.write(b"b").unwrap();
    assert_eq!(sink.commits(), 1);
    assert_eq!(sink.data(), vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn explicit_start_before_attach_commits_at_attach() {
    let response = Response::new();
    response.set_buffering(true);
    response.write(b"body").unwrap();
    response.start().unwrap();
    assert!(response.is_started());
    assert!(!response.is_committed());

    let sink = RecordingSink::new();
    attach(&response, &sink);
    assert!(response.is_committed());
    assert_eq!(sink.commits(), 1);
    assert_eq!(sink.data(), vec![b"body".to_vec()]);
}

#[test]
fn end_twice_ends_the_sink_once() {
    let response = Response::new();
    let sink = RecordingSink::new();
    response.end();
    response.end();
    attach(&response, &sink);
    response.end();
    response.error(ResponseError::Handler("late".to_string()));

    assert_eq!(sink.ends(), 1);
    assert_eq!(sink.events().last(), Some(&Recorded::End(None)));
}

#[test]
fn write_after_end_is_ignored() {
    let response = Response::new();
    let sink = RecordingSink::new();
    attach(&response, &sink);
    response.end_with(b"done").unwrap();

    assert!(!response.write(b"extra").unwrap());
    assert!(!response.flush().unwrap());
    assert_eq!(sink.data(), vec![b"done".to_vec()]);
    assert_eq!(sink.ends(), 1);
}

#[test]
fn error_ends_with_error_and_stops_output() {
    let response = Response::new();
    let sink = RecordingSink::new();
    attach(&response, &sink);
    response.write(b"partial").unwrap();
    response.error(ResponseError::Handler("hub failed".to_string()));
    response.write(b"never").unwrap();

    assert_eq!(sink.data(), vec![b"partial".to_vec()]);
    assert_eq!(
        sink.events().last(),
        Some(&Recorded::End(Some("handler error: hub failed".to_string())))
    );
}

#[test]
fn headers_changed_after_commit_are_not_sent() {
    let response = Response::new();
    let sink = RecordingSink::new();
    attach(&response, &sink);
    response.set_header("X-Early", "1");
    response.flush().unwrap();
    response.set_header("X-Late", "1");

    // still readable locally
    assert_eq!(response.header("X-Late").as_deref(), Some("1"));
    assert_eq!(sink.commits(), 1);
    match &sink.events()[0] {
        Recorded::Commit { headers, .. } => {
            assert!(headers.contains("x-early"));
            assert!(!headers.contains("x-late"));
        }
        other => panic!("expected commit, got {other:?}"),
    }
}

#[test]
fn cancelled_request_drops_writes() {
    let response = Response::new();
    let sink = RecordingSink::new();
    let token = CancellationToken::new();
    response.attach(sink.clone(), token.clone()).unwrap();
    response.write(b"first").unwrap();

    token.cancel();
    assert!(!response.write(b"second").unwrap());
    response.end();

    assert_eq!(sink.data(), vec![b"first".to_vec()]);
    assert_eq!(sink.ends(), 1);
}

#[test]
fn cancelled_buffered_write_completes_without_queueing() {
    let response = Response::new();
    response.set_buffering(true);
    let sink = RecordingSink::new();
    let token = CancellationToken::new();
    response.attach(sink.clone(), token.clone()).unwrap();

    token.cancel();
    assert!(!response.write(b"gone").unwrap());
    assert!(!response.flush().unwrap());
    assert!(!response.is_started());
    assert!(sink.events().is_empty());
}

#[test]
fn failed_commit_ends_once_and_writes_nothing() {
    let response = Response::new();
    response.write(b"x").unwrap();

    let sink = RecordingSink::failing_commit();
    attach(&response, &sink);
    response.write(b"y").unwrap();
    response.end();

    assert!(sink.data().is_empty());
    assert_eq!(sink.ends(), 1);
    match sink.events().as_slice() {
        [Recorded::End(Some(message))] => assert!(message.starts_with("transport error")),
        other => panic!("expected a single failed end, got {other:?}"),
    }
}

#[test]
fn failed_direct_write_ends_with_error_and_is_returned() {
    let response = Response::new();
    let sink = RecordingSink::failing_data();
    attach(&response, &sink);
    response.flush().unwrap();
    assert!(response.is_committed());

    match response.write(b"x") {
        Err(ResponseError::Transport(err)) => {
            assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset)
        }
        other => panic!("expected a transport error, got {other:?}"),
    }
    assert!(!response.write(b"after").unwrap());
    response.end();

    assert!(sink.data().is_empty());
    assert_eq!(sink.ends(), 1);
    match sink.events().last() {
        Some(Recorded::End(Some(message))) => assert!(message.starts_with("transport error")),
        other => panic!("expected a failed end, got {other:?}"),
    }
}

#[test]
fn on_start_runs_in_order_with_writes() {
    let response = Response::new();
    response.set_buffering(true);
    response.write(b"1").unwrap();
    response.on_start(|r| r.write(b"2").map(|_| ()));
    response.write(b"3").unwrap();

    let sink = RecordingSink::new();
    attach(&response, &sink);
    response.start().unwrap();
    response.end();

    assert_eq!(
        sink.data(),
        vec![b"1".to_vec(), b"3".to_vec(), b"2".to_vec()],
        "a write issued from a continuation joins the back of the queue"
    );
}

#[test]
fn delete_cookie_leaves_only_an_expired_entry() {
    let response = Response::new();
    response.set_cookie("session", "abc");
    response.set_cookie_with("session", &CookieOptions::new("live").path(""));
    response.set_cookie("theme", "dark");
    response.delete_cookie("session");

    let cookies = response.headers_of("Set-Cookie").unwrap();
    let session: Vec<_> = cookies.iter().filter(|c| c.starts_with("session=")).collect();
    assert_eq!(session.len(), 1);
    assert!(cookies.iter().any(|c| c.starts_with("theme=dark")));
    assert!(rustygate::http::cookie::is_expired(
        session[0],
        std::time::SystemTime::now()
    ));
}

#[test]
fn start_and_attach_race_commits_exactly_once() {
    for _ in 0..200 {
        let response = Arc::new(Response::new());
        let sink = RecordingSink::new();

        thread::scope(|s| {
            let r = response.clone();
            s.spawn(move || r.start().unwrap());
            let r = response.clone();
            let k = sink.clone();
            s.spawn(move || r.attach(k, CancellationToken::new()).unwrap());
        });

        assert!(response.is_committed());
        assert_eq!(sink.commits(), 1);
    }
}

#[test]
fn concurrent_writes_racing_attach_are_delivered_exactly_once() {
    const WRITERS: u8 = 4;
    const PER_WRITER: u8 = 50;

    for _ in 0..20 {
        let response = Arc::new(Response::new());
        let sink = RecordingSink::new();

        thread::scope(|s| {
            for writer in 0..WRITERS {
                let r = response.clone();
                s.spawn(move || {
                    for seq in 0..PER_WRITER {
                        r.write(&[writer, seq]).unwrap();
                    }
                });
            }
            let r = response.clone();
            let k = sink.clone();
            s.spawn(move || r.attach(k, CancellationToken::new()).unwrap());
        });
        response.end();

        let data = sink.data();
        assert_eq!(data.len(), usize::from(WRITERS) * usize::from(PER_WRITER));
        assert_eq!(sink.commits(), 1);
        assert_eq!(sink.ends(), 1);
        // commit precedes every chunk
        assert!(matches!(sink.events()[0], Recorded::Commit { .. }));

        for writer in 0..WRITERS {
            let seqs: Vec<u8> = data
                .iter()
                .filter(|chunk| chunk[0] == writer)
                .map(|chunk| chunk[1])
                .collect();
            assert_eq!(seqs, (0..PER_WRITER).collect::<Vec<_>>());
        }
    }
}
