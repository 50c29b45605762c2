//! The language-server client proper: lifecycle handshake, outgoing
//! requests/notifications, and correlation of server responses back into
//! typed events.
//!
//! All parsing happens on the IPC reader thread; the resulting [`LspEvent`]
//! values cross to the UI thread over the channel supplied at start-up. The
//! client addresses documents only by URI and version, never by reference.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crossbeam_channel::Sender;
use serde_json::{Value, json};
use tracing::{debug, trace, warn};

use crate::jsonrpc::{
    FrameReader, JSONRPC_VERSION, Notification, RawMessage, Request, Response, frame,
};
use crate::types::{
    CompletionResponse, DidChangeParams, DidCloseParams, DidOpenParams, Location,
    PublishDiagnosticsParams, Position, SignatureHelp, TextDocumentContentChangeEvent,
    TextDocumentIdentifier, TextDocumentItem, TextDocumentPositionParams,
    VersionedTextDocumentIdentifier,
};
use crate::types::{CompletionItem, Diagnostic};
use crate::{LspError, Uri};
use pat_ipc::{Ipc, IpcOptions, IpcStdin};

/// What an in-flight request id resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Initialize,
    Shutdown,
    Completion,
    SignatureHelp,
    Hover,
    Definition,
    Declaration,
}

#[derive(Debug, Clone)]
struct Pending {
    kind: PendingKind,
    uri: Option<Uri>,
    version: u32,
}

/// Parsed server traffic, delivered to the editor's result queue.
#[derive(Debug)]
pub enum LspEvent {
    Initialized {
        server: String,
    },
    Completion {
        uri: Uri,
        version: u32,
        items: Vec<CompletionItem>,
    },
    SignatureHelp {
        uri: Uri,
        version: u32,
        help: Option<SignatureHelp>,
    },
    Hover {
        uri: Uri,
        contents: Option<String>,
    },
    Definition {
        uri: Uri,
        locations: Vec<Location>,
    },
    Diagnostics {
        uri: Uri,
        version: Option<u32>,
        diagnostics: Vec<Diagnostic>,
    },
    ServerExited {
        server: String,
        code: Option<i32>,
    },
}

struct Shared {
    server: String,
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, Pending>>,
    ready: AtomicBool,
    queued: Mutex<Vec<String>>,
    stdin: OnceLock<IpcStdin>,
    events: Sender<LspEvent>,
}

impl Shared {
    fn write_frame(&self, wire: String) {
        match self.stdin.get() {
            Some(stdin) => stdin.write(wire),
            None => warn!(target: "lsp.client", server = %self.server, "dropping frame before stdin is wired"),
        }
    }

    /// Send now when the handshake is done, queue otherwise.
    fn send_or_queue(&self, wire: String) {
        if self.ready.load(Ordering::Acquire) {
            self.write_frame(wire);
        } else {
            self.queued.lock().expect("queued lock").push(wire);
        }
    }
}

/// A running language server shared by every document of its language.
pub struct LspClient {
    shared: Arc<Shared>,
    // Owns the child; dropped on shutdown which kills the server.
    ipc: Mutex<Option<Ipc>>,
}

impl LspClient {
    /// Spawn `file argv...` and begin the `initialize` handshake. Events
    /// flow into `events` from the reader thread.
    pub fn start(
        server: impl Into<String>,
        file: &str,
        argv: Vec<String>,
        root: Option<&Path>,
        events: Sender<LspEvent>,
    ) -> Result<Self, LspError> {
        let server = server.into();
        let shared = Arc::new(Shared {
            server: server.clone(),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            ready: AtomicBool::new(false),
            queued: Mutex::new(Vec::new()),
            stdin: OnceLock::new(),
            events,
        });

        let mut options = IpcOptions::new(file);
        options.argv = argv;
        options.sending_inputs = true;

        let reader_shared = shared.clone();
        let mut reader = FrameReader::new();
        options.on_stdout = Some(Box::new(move |chunk| {
            for message in reader.feed(chunk) {
                process_message(&reader_shared, message);
            }
        }));

        let err_server = server.clone();
        options.on_stderr = Some(Box::new(move |chunk| {
            trace!(target: "lsp.server", server = %err_server, stderr = %String::from_utf8_lossy(chunk));
        }));

        let exit_shared = shared.clone();
        options.on_exit = Some(Box::new(move |code| {
            debug!(target: "lsp.client", server = %exit_shared.server, ?code, "server exited");
            let _ = exit_shared.events.send(LspEvent::ServerExited {
                server: exit_shared.server.clone(),
                code,
            });
        }));

        let ipc = Ipc::spawn(options)?;
        shared
            .stdin
            .set(ipc.stdin_handle().expect("stdin was requested"))
            .ok()
            .expect("stdin handle set once");

        let client = Self {
            shared,
            ipc: Mutex::new(Some(ipc)),
        };
        client.send_initialize(root);
        Ok(client)
    }

    pub fn server_name(&self) -> &str {
        &self.shared.server
    }

    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    fn send_initialize(&self, root: Option<&Path>) {
        let root_uri = root.map(Uri::from_path);
        let params = json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "capabilities": {
                "textDocument": {
                    "synchronization": { "didSave": false },
                    "completion": { "completionItem": { "snippetSupport": false } },
                    "signatureHelp": {},
                    "publishDiagnostics": { "versionSupport": true },
                },
            },
        });
        self.request(
            "initialize",
            Some(params),
            Pending {
                kind: PendingKind::Initialize,
                uri: None,
                version: 0,
            },
        );
    }

    fn request(&self, method: &str, params: Option<Value>, pending: Pending) -> u64 {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .pending
            .lock()
            .expect("pending lock")
            .insert(id, pending);
        let body = serde_json::to_string(&Request {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        })
        .expect("request serialization");
        let wire = frame(&body);
        trace!(target: "lsp.client", server = %self.shared.server, method, id, "request");
        // Everything except the handshake opener waits for the handshake.
        if method == "initialize" {
            self.shared.write_frame(wire);
        } else {
            self.shared.send_or_queue(wire);
        }
        id
    }

    fn notify(&self, method: &str, params: Option<Value>) {
        let wire = notification_frame(method, params);
        trace!(target: "lsp.client", server = %self.shared.server, method, "notification");
        self.shared.send_or_queue(wire);
    }

    // ------------------------------------------------------------------
    // Document lifecycle
    // ------------------------------------------------------------------

    pub fn did_open(&self, uri: &Uri, language_id: &str, version: u32, text: &str) {
        let params = DidOpenParams {
            text_document: TextDocumentItem {
                uri: uri.as_str().to_string(),
                language_id: language_id.to_string(),
                version,
                text: text.to_string(),
            },
        };
        self.notify("textDocument/didOpen", serde_json::to_value(params).ok());
    }

    /// One notification per history commit, in commit order, carrying the
    /// document's own (monotonically increasing) version.
    pub fn did_change(
        &self,
        uri: &Uri,
        version: u32,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) {
        let params = DidChangeParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: uri.as_str().to_string(),
                version,
            },
            content_changes: changes,
        };
        self.notify("textDocument/didChange", serde_json::to_value(params).ok());
    }

    pub fn did_close(&self, uri: &Uri) {
        let params = DidCloseParams {
            text_document: TextDocumentIdentifier {
                uri: uri.as_str().to_string(),
            },
        };
        self.notify("textDocument/didClose", serde_json::to_value(params).ok());
        // Any responses still in flight for this document will be matched on
        // arrival and discarded by the version check on the document side.
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    pub fn completion(&self, uri: &Uri, version: u32, position: Position) -> u64 {
        self.position_request("textDocument/completion", PendingKind::Completion, uri, version, position)
    }

    pub fn signature_help(&self, uri: &Uri, version: u32, position: Position) -> u64 {
        self.position_request(
            "textDocument/signatureHelp",
            PendingKind::SignatureHelp,
            uri,
            version,
            position,
        )
    }

    pub fn hover(&self, uri: &Uri, version: u32, position: Position) -> u64 {
        self.position_request("textDocument/hover", PendingKind::Hover, uri, version, position)
    }

    pub fn definition(&self, uri: &Uri, version: u32, position: Position) -> u64 {
        self.position_request(
            "textDocument/definition",
            PendingKind::Definition,
            uri,
            version,
            position,
        )
    }

    pub fn declaration(&self, uri: &Uri, version: u32, position: Position) -> u64 {
        self.position_request(
            "textDocument/declaration",
            PendingKind::Declaration,
            uri,
            version,
            position,
        )
    }

    fn position_request(
        &self,
        method: &str,
        kind: PendingKind,
        uri: &Uri,
        version: u32,
        position: Position,
    ) -> u64 {
        let params = TextDocumentPositionParams {
            text_document: TextDocumentIdentifier {
                uri: uri.as_str().to_string(),
            },
            position,
        };
        self.request(
            method,
            serde_json::to_value(params).ok(),
            Pending {
                kind,
                uri: Some(uri.clone()),
                version,
            },
        )
    }

    /// Polite teardown: `shutdown` request, then `exit` once it answers; the
    /// child is killed regardless when the IPC drops.
    pub fn shutdown(&self) {
        self.request(
            "shutdown",
            None,
            Pending {
                kind: PendingKind::Shutdown,
                uri: None,
                version: 0,
            },
        );
    }
}

impl Drop for LspClient {
    fn drop(&mut self) {
        if let Ok(mut ipc) = self.ipc.lock() {
            ipc.take(); // kills the child and joins IO threads
        }
    }
}

fn notification_frame(method: &str, params: Option<Value>) -> String {
    let body = serde_json::to_string(&Notification {
        jsonrpc: JSONRPC_VERSION,
        method,
        params,
    })
    .expect("notification serialization");
    frame(&body)
}

/// Classify and dispatch one decoded message. Runs on the reader thread.
fn process_message(shared: &Shared, message: RawMessage) {
    match (message.id.clone(), message.method.clone()) {
        // Request from the server: we implement none, so answer with
        // MethodNotFound rather than leaving it hanging.
        (Some(id), Some(method)) => {
            debug!(target: "lsp.client", server = %shared.server, method = %method, "unhandled server request");
            let response = Response::method_not_found(id.clone(), &method);
            if let Ok(body) = serde_json::to_string(&response) {
                shared.write_frame(frame(&body));
            }
        }
        (None, Some(method)) => process_notification(shared, &method, message.params),
        (Some(id), None) => process_response(shared, &id, message),
        (None, None) => {
            warn!(target: "lsp.client", server = %shared.server, "message with neither id nor method");
        }
    }
}

fn process_notification(shared: &Shared, method: &str, params: Option<Value>) {
    match method {
        "textDocument/publishDiagnostics" => {
            let Some(params) = params else { return };
            match serde_json::from_value::<PublishDiagnosticsParams>(params) {
                Ok(diags) => {
                    let _ = shared.events.send(LspEvent::Diagnostics {
                        uri: Uri::from(diags.uri),
                        version: diags.version,
                        diagnostics: diags.diagnostics,
                    });
                }
                Err(err) => {
                    warn!(target: "lsp.client", server = %shared.server, %err, "bad publishDiagnostics");
                }
            }
        }
        other => {
            trace!(target: "lsp.client", server = %shared.server, method = other, "ignored notification");
        }
    }
}

fn process_response(shared: &Shared, id: &Value, message: RawMessage) {
    let Some(id) = id.as_u64() else {
        warn!(target: "lsp.client", server = %shared.server, "response with non-integer id");
        return;
    };
    let Some(pending) = shared.pending.lock().expect("pending lock").remove(&id) else {
        // Protocol error: log and discard; nothing else to clear.
        warn!(target: "lsp.client", server = %shared.server, id, "response with unknown id");
        return;
    };

    if let Some(error) = &message.error {
        warn!(
            target: "lsp.client",
            server = %shared.server,
            id,
            code = error.code,
            message = %error.message,
            "request failed"
        );
        return;
    }

    let result = message.result.unwrap_or(Value::Null);
    match pending.kind {
        PendingKind::Initialize => {
            debug!(target: "lsp.client", server = %shared.server, "initialize handshake complete");
            shared.write_frame(notification_frame("initialized", Some(json!({}))));
            shared.ready.store(true, Ordering::Release);
            let queued = std::mem::take(&mut *shared.queued.lock().expect("queued lock"));
            for wire in queued {
                shared.write_frame(wire);
            }
            let _ = shared.events.send(LspEvent::Initialized {
                server: shared.server.clone(),
            });
        }
        PendingKind::Shutdown => {
            shared.write_frame(notification_frame("exit", None));
        }
        PendingKind::Completion => {
            let items = if result.is_null() {
                Vec::new()
            } else {
                match serde_json::from_value::<CompletionResponse>(result) {
                    Ok(response) => response.into_items(),
                    Err(err) => {
                        warn!(target: "lsp.client", server = %shared.server, %err, "bad completion result");
                        return;
                    }
                }
            };
            let _ = shared.events.send(LspEvent::Completion {
                uri: pending.uri.expect("completion pending carries a uri"),
                version: pending.version,
                items,
            });
        }
        PendingKind::SignatureHelp => {
            let help = if result.is_null() {
                None
            } else {
                serde_json::from_value::<SignatureHelp>(result).ok()
            };
            let _ = shared.events.send(LspEvent::SignatureHelp {
                uri: pending.uri.expect("signature pending carries a uri"),
                version: pending.version,
                help,
            });
        }
        PendingKind::Hover => {
            let contents = hover_text(&result);
            let _ = shared.events.send(LspEvent::Hover {
                uri: pending.uri.expect("hover pending carries a uri"),
                contents,
            });
        }
        PendingKind::Definition | PendingKind::Declaration => {
            let locations = parse_locations(result);
            let _ = shared.events.send(LspEvent::Definition {
                uri: pending.uri.expect("definition pending carries a uri"),
                locations,
            });
        }
    }
}

/// Hover results come as a string, `{value}` markup, or arrays of either.
fn hover_text(result: &Value) -> Option<String> {
    let contents = result.get("contents")?;
    fn one(value: &Value) -> Option<String> {
        if let Some(s) = value.as_str() {
            return Some(s.to_string());
        }
        value
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
    match contents {
        Value::Array(parts) => {
            let text: Vec<String> = parts.iter().filter_map(one).collect();
            if text.is_empty() { None } else { Some(text.join("\n")) }
        }
        other => one(other),
    }
}

/// `definition` may answer with a Location, Location[], or LocationLink[].
fn parse_locations(result: Value) -> Vec<Location> {
    fn one(value: &Value) -> Option<Location> {
        if let Ok(loc) = serde_json::from_value::<Location>(value.clone()) {
            return Some(loc);
        }
        // LocationLink form.
        let uri = value.get("targetUri")?.as_str()?.to_string();
        let range = serde_json::from_value(value.get("targetRange")?.clone()).ok()?;
        Some(Location { uri, range })
    }
    match &result {
        Value::Array(items) => items.iter().filter_map(one).collect(),
        Value::Null => Vec::new(),
        single => one(single).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use serde_json::json;

    fn shared_with_channel() -> (Arc<Shared>, crossbeam_channel::Receiver<LspEvent>) {
        let (tx, rx) = unbounded();
        let shared = Arc::new(Shared {
            server: "test-ls".to_string(),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            ready: AtomicBool::new(false),
            queued: Mutex::new(Vec::new()),
            stdin: OnceLock::new(),
            events: tx,
        });
        (shared, rx)
    }

    fn raw(value: Value) -> RawMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn completion_response_correlates_by_id() {
        let (shared, rx) = shared_with_channel();
        shared.pending.lock().unwrap().insert(
            7,
            Pending {
                kind: PendingKind::Completion,
                uri: Some(Uri::from_path("/tmp/a.rs")),
                version: 3,
            },
        );

        process_message(
            &shared,
            raw(json!({"jsonrpc": "2.0", "id": 7, "result": [{"label": "foo"}]})),
        );

        match rx.try_recv().unwrap() {
            LspEvent::Completion { uri, version, items } => {
                assert_eq!(uri.as_str(), "file:///tmp/a.rs");
                assert_eq!(version, 3);
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].label, "foo");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(shared.pending.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_id_is_discarded() {
        let (shared, rx) = shared_with_channel();
        process_message(
            &shared,
            raw(json!({"jsonrpc": "2.0", "id": 99, "result": null})),
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn error_response_clears_pending_without_event() {
        let (shared, rx) = shared_with_channel();
        shared.pending.lock().unwrap().insert(
            2,
            Pending {
                kind: PendingKind::Completion,
                uri: Some(Uri::from_path("/tmp/a.rs")),
                version: 1,
            },
        );
        process_message(
            &shared,
            raw(json!({"jsonrpc": "2.0", "id": 2,
                       "error": {"code": -32700, "message": "parse error"}})),
        );
        assert!(rx.try_recv().is_err());
        assert!(shared.pending.lock().unwrap().is_empty());
    }

    #[test]
    fn publish_diagnostics_dispatches_by_uri() {
        let (shared, rx) = shared_with_channel();
        process_message(
            &shared,
            raw(json!({
                "jsonrpc": "2.0",
                "method": "textDocument/publishDiagnostics",
                "params": {
                    "uri": "file:///tmp/b.rs",
                    "version": 9,
                    "diagnostics": [{
                        "range": {"start": {"line": 1, "character": 0},
                                  "end": {"line": 1, "character": 4}},
                        "severity": 1,
                        "message": "boom"
                    }]
                }
            })),
        );
        match rx.try_recv().unwrap() {
            LspEvent::Diagnostics { uri, version, diagnostics } => {
                assert_eq!(uri.as_str(), "file:///tmp/b.rs");
                assert_eq!(version, Some(9));
                assert_eq!(diagnostics[0].message, "boom");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn initialize_response_flushes_queue_and_reports_ready() {
        let (shared, rx) = shared_with_channel();
        shared.pending.lock().unwrap().insert(
            1,
            Pending {
                kind: PendingKind::Initialize,
                uri: None,
                version: 0,
            },
        );
        shared
            .queued
            .lock()
            .unwrap()
            .push(notification_frame("textDocument/didOpen", None));

        process_message(
            &shared,
            raw(json!({"jsonrpc": "2.0", "id": 1, "result": {"capabilities": {}}})),
        );

        assert!(shared.ready.load(Ordering::Acquire));
        assert!(shared.queued.lock().unwrap().is_empty());
        match rx.try_recv().unwrap() {
            LspEvent::Initialized { server } => assert_eq!(server, "test-ls"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn hover_contents_variants() {
        assert_eq!(
            hover_text(&json!({"contents": "plain"})),
            Some("plain".to_string())
        );
        assert_eq!(
            hover_text(&json!({"contents": {"kind": "markdown", "value": "# doc"}})),
            Some("# doc".to_string())
        );
        assert_eq!(
            hover_text(&json!({"contents": ["a", {"value": "b"}]})),
            Some("a\nb".to_string())
        );
        assert_eq!(hover_text(&json!(null)), None);
    }

    #[test]
    fn definition_location_shapes() {
        let single = parse_locations(json!({
            "uri": "file:///x.rs",
            "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 1}}
        }));
        assert_eq!(single.len(), 1);

        let links = parse_locations(json!([{
            "targetUri": "file:///y.rs",
            "targetRange": {"start": {"line": 2, "character": 0}, "end": {"line": 2, "character": 5}},
            "targetSelectionRange": {"start": {"line": 2, "character": 0}, "end": {"line": 2, "character": 5}}
        }]));
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].uri, "file:///y.rs");

        assert!(parse_locations(json!(null)).is_empty());
    }
}
