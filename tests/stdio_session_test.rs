//! Stdio session: the watch protocol as newline-delimited JSON.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};
use watchbridge::session::serve;
use watchbridge::{
    Canonicalizer, Disposer, FileWatcherCallback, FileWatcherEventKind, Session, StdioSession,
    WatchFactory,
};

fn output_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each output line is JSON"))
        .collect()
}

fn request_line(seq: u64, id: u64, path: &str, event_type: &str) -> String {
    let request = json!({
        "seq": seq,
        "type": "request",
        "command": "onWatchChange",
        "arguments": {"id": id, "path": path, "eventType": event_type},
    });
    format!("{request}\n")
}

#[tokio::test]
async fn test_create_change_and_ack() {
    let (session, events) = StdioSession::new(Canonicalizer::new(true), 16);
    let session = Rc::new(session);
    let factory = WatchFactory::new();
    factory.create(Some(session.clone() as Rc<dyn Session>)).unwrap();

    let calls: Rc<RefCell<Vec<(String, FileWatcherEventKind)>>> = Rc::default();
    let sink = calls.clone();
    let callback: FileWatcherCallback = Rc::new(move |path: &str, kind: FileWatcherEventKind| {
        sink.borrow_mut().push((path.to_string(), kind));
    });
    let _watcher = factory.watch_file("/x/a.ts", callback).unwrap();

    let input = request_line(7, 1, "/x/a.ts", "create");
    let mut output = Vec::new();
    serve(&session, events, input.as_bytes(), &mut output, || {})
        .await
        .unwrap();

    let lines = output_lines(&output);
    assert_eq!(lines.len(), 2);

    assert_eq!(lines[0]["type"], "event");
    assert_eq!(lines[0]["event"], "createFileWatcher");
    assert_eq!(lines[0]["body"], json!({"path": "/x/a.ts", "id": 1}));

    assert_eq!(lines[1]["type"], "response");
    assert_eq!(lines[1]["command"], "onWatchChange");
    assert_eq!(lines[1]["request_seq"], 7);
    assert_eq!(lines[1]["success"], true);
    assert_eq!(lines[1]["body"], "onWatchChangeComplete");
    assert!(lines[1]["seq"].as_u64() > lines[0]["seq"].as_u64());

    assert_eq!(
        *calls.borrow(),
        vec![("/x/a.ts".to_string(), FileWatcherEventKind::Created)]
    );
}

#[tokio::test]
async fn test_close_raised_during_request_precedes_response() {
    let (session, events) = StdioSession::new(Canonicalizer::new(true), 16);
    let session = Rc::new(session);
    let factory = WatchFactory::new();
    factory.create(Some(session.clone() as Rc<dyn Session>)).unwrap();

    // The watcher closes itself once its directory is deleted.
    let slot: Rc<RefCell<Option<Disposer>>> = Rc::default();
    let inner = slot.clone();
    let watcher = factory
        .watch_directory(
            "/proj",
            Rc::new(move |_: &str| {
                if let Some(watcher) = inner.borrow_mut().take() {
                    watcher.close();
                }
            }),
            true,
        )
        .unwrap();
    *slot.borrow_mut() = Some(watcher);

    let input = format!(
        "{}{}",
        request_line(1, 1, "/proj/a.ts", "update"),
        request_line(2, 1, "/proj", "delete")
    );
    let mut output = Vec::new();
    serve(&session, events, input.as_bytes(), &mut output, || {})
        .await
        .unwrap();

    let lines = output_lines(&output);
    let kinds: Vec<String> = lines
        .iter()
        .map(|line| {
            line["event"]
                .as_str()
                .or(line["command"].as_str())
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "createDirectoryWatcher",
            "onWatchChange",
            "closeWatcher",
            "onWatchChange"
        ]
    );
    assert_eq!(lines[0]["body"], json!({"path": "/proj", "id": 1, "recursive": true}));
    assert_eq!(lines[2]["body"], json!({"id": 1, "type": "rDir"}));
    assert_eq!(factory.stats().total(), 0);
}

#[tokio::test]
async fn test_bad_input_gets_error_responses() {
    let (session, events) = StdioSession::new(Canonicalizer::new(true), 16);
    let session = Rc::new(session);
    let factory = WatchFactory::new();
    factory.create(Some(session.clone() as Rc<dyn Session>)).unwrap();

    let input = concat!(
        "this is not json\n",
        "\n",
        "{\"seq\":5,\"type\":\"request\",\"command\":\"geterr\"}\n",
        "{\"seq\":6,\"type\":\"request\",\"command\":\"onWatchChange\",\"arguments\":{\"id\":1}}\n",
        "{\"seq\":7,\"type\":\"request\",\"command\":\"onWatchChange\",\"arguments\":{\"id\":99,\"path\":\"/q\",\"eventType\":\"delete\"}}\n",
    );
    let mut output = Vec::new();
    serve(&session, events, input.as_bytes(), &mut output, || {})
        .await
        .unwrap();

    let lines = output_lines(&output);
    assert_eq!(lines.len(), 4);

    assert_eq!(lines[0]["success"], false);
    assert_eq!(lines[0]["request_seq"], 0);

    assert_eq!(lines[1]["success"], false);
    assert_eq!(lines[1]["message"], "Unrecognized JSON command: geterr");

    assert_eq!(lines[2]["success"], false);
    assert_eq!(lines[2]["request_seq"], 6);

    assert_eq!(lines[3]["success"], true);
    assert_eq!(lines[3]["body"], "onWatchChangeComplete");
}

#[tokio::test]
async fn test_watches_closed_at_shutdown_are_written() {
    let (session, events) = StdioSession::new(Canonicalizer::new(true), 16);
    let session = Rc::new(session);
    let factory = WatchFactory::new();
    factory.create(Some(session.clone() as Rc<dyn Session>)).unwrap();

    let file_watch = factory
        .watch_file("/x/a.ts", Rc::new(|_: &str, _: FileWatcherEventKind| {}))
        .unwrap();
    let dir_watch = factory
        .watch_directory("/x", Rc::new(|_: &str| {}), false)
        .unwrap();

    let mut output = Vec::new();
    serve(&session, events, "".as_bytes(), &mut output, || {
        file_watch.close();
        dir_watch.close();
    })
    .await
    .unwrap();

    let lines = output_lines(&output);
    let events: Vec<&str> = lines
        .iter()
        .filter_map(|line| line["event"].as_str())
        .collect();
    assert_eq!(
        events,
        vec![
            "createFileWatcher",
            "createDirectoryWatcher",
            "closeWatcher",
            "closeWatcher"
        ]
    );
    assert_eq!(lines[2]["body"], json!({"id": 1, "type": "file"}));
    assert_eq!(lines[3]["body"], json!({"id": 2, "type": "dir"}));
    assert_eq!(factory.stats().total(), 0);
}
