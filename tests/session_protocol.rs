// End-to-end tests: a client drives a full session over an in-memory stream.

use rouillexferd::constants::MIB;
use rouillexferd::core_auth::core_auth::{CredentialRecord, PasswdFile};
use rouillexferd::core_auth::helper::hash_password;
use rouillexferd::core_events::{EventRecord, EventSink, TransferRecord};
use rouillexferd::core_network::framer::Framer;
use rouillexferd::core_network::network::handle_connection;
use rouillexferd::policy::{ExtensionClass, SizePolicy};
use rouillexferd::server::ServerContext;
use rouillexferd::session::{KeyIssuance, SessionKey};
use rouillexferd::XferError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{duplex, DuplexStream};
use tokio::task::JoinHandle;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<EventRecord>>,
    transfers: Mutex<Vec<TransferRecord>>,
}

impl EventSink for RecordingSink {
    fn record_event(&self, record: EventRecord) {
        self.events.lock().unwrap().push(record);
    }

    fn record_transfer(&self, record: TransferRecord) {
        self.transfers.lock().unwrap().push(record);
    }
}

struct Harness {
    storage: TempDir,
    sink: Arc<RecordingSink>,
    client: Framer<DuplexStream>,
    server: JoinHandle<Result<(), XferError>>,
}

fn small_policy() -> SizePolicy {
    SizePolicy {
        classes: vec![ExtensionClass {
            name: "Text".to_string(),
            extensions: vec!["txt".to_string()],
            min_bytes: 16,
        }],
    }
}

fn start(policy: SizePolicy, key_issuance: KeyIssuance) -> Harness {
    let storage = tempfile::tempdir().unwrap();
    let salt = b"0123456789abcdef".to_vec();
    let credentials = PasswdFile::from_records(vec![CredentialRecord::new(
        "matt",
        &hash_password("admin123", &salt),
        salt,
    )]);
    let sink = Arc::new(RecordingSink::default());

    let ctx = Arc::new(ServerContext {
        storage_root: storage.path().to_path_buf(),
        policy,
        credentials: Arc::new(credentials),
        events: sink.clone(),
        chunk_size: 64 * 1024,
        max_line_length: 8 * 1024,
        idle_timeout: None,
        key_issuance,
    });

    let (client, server_side) = duplex(64 * 1024);
    let server = tokio::spawn(async move {
        handle_connection(server_side, "test-peer".to_string(), &ctx).await
    });

    Harness {
        storage,
        sink,
        client: Framer::new(client, 64 * 1024, None),
        server,
    }
}

impl Harness {
    async fn expect(&mut self, line: &str) {
        assert_eq!(self.client.read_line().await.unwrap().as_deref(), Some(line));
    }

    async fn send(&mut self, line: &str) {
        self.client.write_line(line).await.unwrap();
    }

    async fn login(&mut self) {
        self.expect("AUTH@USERNAME").await;
        self.send("matt").await;
        self.expect("AUTH@PASSWORD").await;
        self.send("admin123").await;
        self.expect("AUTH@OK").await;
    }

    async fn upload(&mut self, name: &str, data: &[u8]) -> String {
        self.send(&format!("UPLOAD@{}@{}", name, data.len())).await;
        self.expect("OK@READY").await;
        self.client.write_payload(data).await.unwrap();
        self.client.flush().await.unwrap();
        self.client.read_line().await.unwrap().unwrap()
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.storage.path().join(name)
    }
}

fn payload(len: usize) -> Vec<u8> {
    // Includes plenty of newline and '@' bytes.
    (0..len).map(|i| (i % 251) as u8 ^ b'\n').collect()
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_upload_then_download_round_trip() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;

    let data = payload(200_000);
    assert_eq!(h.upload("song.txt", &data).await, "OK@Uploaded song.txt");
    assert_eq!(std::fs::read(h.path("song.txt")).unwrap(), data);

    h.send("DOWNLOAD@song.txt").await;
    h.expect("OK@200000").await;
    h.send("READY").await;
    let received = h.client.read_exact(data.len()).await.unwrap();
    assert_eq!(received, data);

    // The stream is still aligned on control lines after the payload.
    h.send("DIR").await;
    h.expect("OK@song.txt").await;

    let transfers = h.sink.transfers.lock().unwrap().clone();
    assert_eq!(transfers.len(), 2);
    assert_eq!(transfers[0].operation, "UPLOAD");
    assert_eq!(transfers[0].bytes, 200_000);
    assert_eq!(transfers[1].operation, "DOWNLOAD");
    assert_eq!(transfers[1].status, "OK");
}

#[tokio::test]
async fn test_overwrite_declined_then_accepted() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;

    let original = payload(1000);
    assert_eq!(h.upload("notes.txt", &original).await, "OK@Uploaded notes.txt");

    h.send("UPLOAD@notes.txt@2000").await;
    h.expect("ERR@File exists. Overwrite? (y/n)").await;
    h.send("n").await;
    h.expect("OK@Upload cancelled.").await;
    assert_eq!(std::fs::read(h.path("notes.txt")).unwrap(), original);

    let replacement = vec![b'z'; 2000];
    h.send("UPLOAD@notes.txt@2000").await;
    h.expect("ERR@File exists. Overwrite? (y/n)").await;
    h.send("y").await;
    h.expect("OK@READY").await;
    h.client.write_payload(&replacement).await.unwrap();
    h.client.flush().await.unwrap();
    h.expect("OK@Uploaded notes.txt").await;
    assert_eq!(std::fs::read(h.path("notes.txt")).unwrap(), replacement);
}

#[tokio::test]
async fn test_undersized_overwrite_keeps_original() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;
    let original = payload(100);
    std::fs::write(h.path("good.txt"), &original).unwrap();

    h.send("UPLOAD@good.txt@4").await;
    h.expect("ERR@File exists. Overwrite? (y/n)").await;
    h.send("y").await;
    h.expect("OK@READY").await;
    h.client.write_payload(b"tiny").await.unwrap();
    h.client.flush().await.unwrap();
    h.expect("ERR@Text file too small (min 16 bytes).").await;

    assert_eq!(std::fs::read(h.path("good.txt")).unwrap(), original);
    assert_eq!(listing(h.storage.path()), vec!["good.txt"]);

    let transfers = h.sink.transfers.lock().unwrap().clone();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].status, "REJECTED");
    assert_eq!(transfers[0].bytes, 4);
}

#[tokio::test]
async fn test_default_size_policy_for_text() {
    let mut h = start(SizePolicy::default(), KeyIssuance::Disabled);
    h.login().await;

    let small = vec![b'a'; (10 * MIB) as usize];
    assert_eq!(
        h.upload("small.txt", &small).await,
        "ERR@Text file too small (min 25 MiB)."
    );
    assert!(!h.path("small.txt").exists());

    let large = vec![b'b'; (26 * MIB) as usize];
    assert_eq!(h.upload("large.txt", &large).await, "OK@Uploaded large.txt");
    assert_eq!(
        std::fs::metadata(h.path("large.txt")).unwrap().len(),
        26 * MIB
    );
}

#[tokio::test]
async fn test_unknown_command_keeps_session() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;

    h.send("FOO@bar").await;
    h.expect("ERR@Unknown command").await;
    h.send("DIR").await;
    h.expect("OK@Directory is empty.").await;
}

#[tokio::test]
async fn test_wrong_password_closes_session() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.expect("AUTH@USERNAME").await;
    h.send("matt").await;
    h.expect("AUTH@PASSWORD").await;
    h.send("wrong").await;
    h.expect("AUTH@FAIL").await;

    assert_eq!(h.client.read_line().await.unwrap(), None);
    let result = h.server.await.unwrap();
    assert!(matches!(result, Err(XferError::Auth(_))));

    let events = h.sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "AUTH");
    assert_eq!(events[0].status, "FAIL");
}

#[tokio::test]
async fn test_unknown_user_is_rejected() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.expect("AUTH@USERNAME").await;
    h.send("nobody").await;
    h.expect("AUTH@PASSWORD").await;
    h.send("admin123").await;
    h.expect("AUTH@FAIL").await;
    assert_eq!(h.client.read_line().await.unwrap(), None);
}

#[tokio::test]
async fn test_subfolders_and_delete() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;

    h.send("SUBFOLDER@create@music").await;
    h.expect("OK@Subfolder 'music' created.").await;
    h.send("SUBFOLDER@create@music").await;
    h.expect("OK@Subfolder 'music' created.").await;

    assert_eq!(
        h.upload("music/a.txt", &payload(64)).await,
        "OK@Uploaded music/a.txt"
    );

    h.send("DIR").await;
    h.expect("OK@music/").await;
    h.send("DIR@music").await;
    h.expect("OK@a.txt").await;

    h.send("SUBFOLDER@delete@music").await;
    h.expect("ERR@Subfolder 'music' is not empty.").await;
    h.send("DELETE@music/a.txt").await;
    h.expect("OK@Deleted music/a.txt").await;
    h.send("SUBFOLDER@delete@music").await;
    h.expect("OK@Subfolder 'music' deleted.").await;
    h.send("SUBFOLDER@delete@music").await;
    h.expect("ERR@Subfolder not found.").await;
    h.send("SUBFOLDER@rename@music").await;
    h.expect("ERR@Invalid subfolder command.").await;

    h.send("DELETE@nope.txt").await;
    h.expect("ERR@File not found.").await;
}

#[tokio::test]
async fn test_multi_entry_listing_is_one_line() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;
    std::fs::write(h.path("b.txt"), b"x").unwrap();
    std::fs::write(h.path("a.txt"), b"x").unwrap();

    h.send("DIR").await;
    h.expect("OK@a.txt\\nb.txt").await;
}

#[tokio::test]
async fn test_rejections_before_payload() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;

    h.send("UPLOAD@tool.exe@100").await;
    h.expect("ERR@Unsupported file type.").await;
    h.send("UPLOAD@../escape.txt@100").await;
    h.expect("ERR@Path is outside of the storage area.").await;
    h.send("UPLOAD@a.txt@lots").await;
    h.expect("ERR@Invalid file size.").await;
    h.send("DOWNLOAD@missing.txt").await;
    h.expect("ERR@File not found.").await;

    std::fs::write(h.path("tiny.txt"), b"short").unwrap();
    h.send("DOWNLOAD@tiny.txt").await;
    h.expect("ERR@Text file too small (min 16 bytes).").await;

    assert!(listing(h.storage.path()).iter().all(|n| n == "tiny.txt"));
}

#[tokio::test]
async fn test_download_cancelled_without_ready() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;
    std::fs::write(h.path("doc.txt"), payload(100)).unwrap();

    h.send("DOWNLOAD@doc.txt").await;
    h.expect("OK@100").await;
    h.send("NO").await;
    h.expect("OK@Download cancelled.").await;
}

#[tokio::test]
async fn test_truncated_upload_leaves_nothing_behind() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;

    h.send("UPLOAD@big.txt@1000").await;
    h.expect("OK@READY").await;
    h.client.write_payload(&payload(100)).await.unwrap();
    h.client.flush().await.unwrap();
    drop(h.client);

    let result = h.server.await.unwrap();
    match result {
        Err(XferError::Truncated { expected, received }) => {
            assert_eq!(expected, 1000);
            assert_eq!(received, 100);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(listing(h.storage.path()).is_empty());
}

#[tokio::test]
async fn test_logout_closes_session() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;

    h.send("LOGOUT").await;
    h.expect("OK@Logged out.").await;
    assert_eq!(h.client.read_line().await.unwrap(), None);
    assert!(h.server.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_session_key_sent_before_login() {
    let key = SessionKey::from_bytes(vec![0xAB; 32]);
    let mut h = start(small_policy(), KeyIssuance::Fixed(key.clone()));

    h.expect(&format!("KEY@{}", key.to_hex())).await;
    h.login().await;
    h.send("LOGOUT").await;
    h.expect("OK@Logged out.").await;
}

#[tokio::test]
async fn test_part_files_hidden_from_listing() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;
    std::fs::write(h.path("a.txt"), b"x").unwrap();
    std::fs::write(h.path(".b.txt.part"), b"half").unwrap();

    h.send("DIR").await;
    h.expect("OK@a.txt").await;
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_disk_failure_drains_payload_and_keeps_session() {
    if !Path::new("/dev/full").exists() {
        return;
    }
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;
    // Every write to the temp file fails with ENOSPC.
    std::os::unix::fs::symlink("/dev/full", h.path(".big.txt.part")).unwrap();

    let reply = h.upload("big.txt", &payload(200_000)).await;
    assert!(reply.starts_with("ERR@"), "unexpected reply: {}", reply);

    // The whole payload was consumed, so the next line is a fresh command.
    h.send("DIR").await;
    h.expect("OK@Directory is empty.").await;
    assert!(listing(h.storage.path()).is_empty());

    let transfers = h.sink.transfers.lock().unwrap().clone();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].status, "FAILED");
}

#[tokio::test]
async fn test_peer_closing_during_login_reports_disconnect() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.expect("AUTH@USERNAME").await;
    h.send("matt").await;
    h.expect("AUTH@PASSWORD").await;
    drop(h.client);

    let result = h.server.await.unwrap();
    assert!(matches!(result, Err(XferError::ConnectionLost(_))));

    let events = h.sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "AUTH");
    assert_eq!(events[0].status, "DISCONNECTED");
    assert_eq!(events[0].note, "user=matt");
}

#[tokio::test]
async fn test_download_of_shrunk_file_tears_down_session() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;
    std::fs::write(h.path("doc.txt"), payload(100)).unwrap();

    h.send("DOWNLOAD@doc.txt").await;
    h.expect("OK@100").await;
    std::fs::OpenOptions::new()
        .write(true)
        .open(h.path("doc.txt"))
        .unwrap()
        .set_len(40)
        .unwrap();
    h.send("READY").await;

    let result = h.server.await.unwrap();
    match result {
        Err(XferError::Truncated { expected, received }) => {
            assert_eq!(expected, 100);
            assert_eq!(received, 40);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    let transfers = h.sink.transfers.lock().unwrap().clone();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].status, "FAILED");
}

#[tokio::test]
async fn test_non_utf8_line_gets_error_and_session_continues() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;

    h.client.write_payload(&[0xff, 0xfe, b'D', b'\n']).await.unwrap();
    h.client.flush().await.unwrap();
    h.expect("ERR@Control line is not valid UTF-8.").await;

    h.send("DIR").await;
    h.expect("OK@Directory is empty.").await;
}

#[tokio::test]
async fn test_rejected_transfers_are_recorded_as_events() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;
    std::fs::write(h.path("doc.txt"), payload(100)).unwrap();

    h.send("UPLOAD@tool.exe@10").await;
    h.expect("ERR@Unsupported file type.").await;
    h.send("DOWNLOAD@missing.txt").await;
    h.expect("ERR@File not found.").await;
    h.send("UPLOAD@doc.txt@100").await;
    h.expect("ERR@File exists. Overwrite? (y/n)").await;
    h.send("n").await;
    h.expect("OK@Upload cancelled.").await;
    h.send("").await;
    h.expect("ERR@Unknown command").await;
    h.send("LOGOUT").await;
    h.expect("OK@Logged out.").await;

    let events = h.sink.events.lock().unwrap().clone();
    let summary: Vec<(&str, &str)> = events
        .iter()
        .filter(|e| e.event != "AUTH")
        .map(|e| (e.event.as_str(), e.status.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("UPLOAD", "ERR"),
            ("DOWNLOAD", "ERR"),
            ("UPLOAD", "OK"),
            ("", "ERR"),
            ("LOGOUT", "OK"),
        ]
    );
    assert!(h.sink.transfers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_backslash_in_name_is_literal() {
    let mut h = start(small_policy(), KeyIssuance::Disabled);
    h.login().await;
    std::fs::write(h.path("dir\\new.txt"), b"x").unwrap();

    h.send("DELETE@dir\\new.txt").await;
    // Outgoing fields escape the backslash.
    h.expect("OK@Deleted dir\\\\new.txt").await;
    assert!(listing(h.storage.path()).is_empty());
}
