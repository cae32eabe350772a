use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::request::{ReadRequest, SubscribeRequest};
use crate::wire::WireFrame;

/// A single server-streaming read or subscribe RPC.
///
/// Frames are pulled one at a time. Cancelling the session's token (or
/// dropping the session) tears the RPC down; a cancelled session yields
/// `None` or [`TransportError::Cancelled`] from `next_frame`.
#[async_trait]
pub trait WireSession: Send + 'static {
    /// Pulls the next frame, `None` once the server has finished.
    async fn next_frame(&mut self) -> Option<Result<WireFrame, TransportError>>;

    /// The token cancelling this session.
    fn cancellation(&self) -> &CancellationToken;
}

/// Opens read and subscribe sessions against an event log server.
#[async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    /// The session type produced by this transport.
    type Session: WireSession;

    /// Opens a finite read. The session is torn down when `cancellation` fires.
    async fn open_read(
        &self,
        request: ReadRequest,
        cancellation: CancellationToken,
    ) -> Result<Self::Session, TransportError>;

    /// Opens a live subscription. The first frame is the server's confirmation
    /// (or a failure). The session is torn down when `cancellation` fires.
    async fn open_subscribe(
        &self,
        request: SubscribeRequest,
        cancellation: CancellationToken,
    ) -> Result<Self::Session, TransportError>;
}
