//! Persistent connection to the dispatcher.
//!
//! The connection manager owns the socket: it connects, sends the shared
//! secret, feeds inbound bytes through the frame decoder, hands decoded jobs
//! to the judger's worker and writes verdicts from the outbox. On any socket
//! or framing fault it drops the connection and reconnects after a fixed
//! delay, forever.

mod connection;
mod state;

pub use connection::{ConnectionManager, JOB_READ_BUFFER_LEN, OUTBOX_CAPACITY};
pub use state::ConnectionState;
