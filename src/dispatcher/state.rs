use std::fmt;

/// Lifecycle of the dispatcher connection.
///
/// ```text
/// Disconnected ─► Connecting ─► Connected ─► Authenticated ─► Disconnected
/// ```
///
/// The secret is sent without a reply, so `Connected` only lasts until the
/// write completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticated,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Authenticated => "authenticated",
        };
        f.write_str(name)
    }
}
