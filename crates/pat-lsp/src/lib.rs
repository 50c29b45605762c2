//! Language-server client: JSON-RPC 2.0 over `Content-Length`-framed stdio,
//! request/response correlation, and document synchronization.
//!
//! The wire runs over [`pat_ipc`]; parsed server traffic is delivered as
//! [`LspEvent`] values on a channel the editor drains on its UI thread. The
//! client itself never touches documents.

pub mod client;
pub mod jsonrpc;
pub mod types;
mod uri;

pub use client::{LspClient, LspEvent, PendingKind};
pub use jsonrpc::{FrameReader, RawMessage, ResponseError, frame};
pub use uri::Uri;

#[derive(Debug, thiserror::Error)]
pub enum LspError {
    #[error("failed to start language server: {0}")]
    Spawn(#[from] pat_ipc::IpcError),
    #[error("language server is not running")]
    NotRunning,
}
