//! Dispatcher wire protocol.
//!
//! Frames on the dispatcher connection are a 4-byte big-endian length
//! followed by that many bytes of UTF-8 JSON. The only unframed bytes are
//! the shared secret written once right after connecting.

pub mod codec;
pub mod message;

pub use codec::{FrameDecoder, LENGTH_PREFIX_LEN, MAX_FRAME_LEN, ProtocolError, encode};
pub use message::{RESULT_REPORT, RunId, SubmissionJob, Verdict};
