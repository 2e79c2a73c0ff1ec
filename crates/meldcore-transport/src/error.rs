/// What can go wrong between the socket and the caller.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer went away mid-conversation.
    #[error("connection closed: {0}")]
    Closed(String),

    /// Binding the listener or accepting a peer failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// An outbound message could not be written.
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    /// An inbound message could not be read.
    #[error("receive failed: {0}")]
    Recv(#[source] std::io::Error),

    /// The transport stopped accepting connections.
    #[error("transport shut down")]
    Shutdown,
}
