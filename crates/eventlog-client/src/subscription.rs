use crate::error::Result;
use crate::message_stream::{MessageStream, Messages, RelayState};

/// A live subscription: a message stream carrying the id the server issued
/// when it confirmed the subscription.
pub struct Subscription {
    id: String,
    stream: MessageStream,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("stream", &self.stream)
            .finish()
    }
}

impl Subscription {
    pub(crate) const fn new(id: String, stream: MessageStream) -> Self {
        Self { id, stream }
    }

    /// The server-issued subscription id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the iterator over the subscription's messages.
    ///
    /// # Errors
    ///
    /// Returns `Error::IteratorActive` if another iterator is alive.
    pub fn messages(&self) -> Result<Messages<'_>> {
        self.stream.messages()
    }

    /// Best-effort count of buffered messages not yet delivered.
    #[must_use]
    pub fn queued_messages(&self) -> usize {
        self.stream.queued_messages()
    }

    /// The lifecycle state.
    #[must_use]
    pub fn state(&self) -> RelayState {
        self.stream.state()
    }

    /// Ends the subscription. See [`MessageStream::dispose`].
    ///
    /// # Errors
    ///
    /// Returns the relay's fault if it faulted and the fault was not
    /// surfaced yet.
    pub async fn dispose(&mut self) -> Result<()> {
        self.stream.dispose().await
    }
}
