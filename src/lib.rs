//! Virtual judger worker node.
//!
//! Connects to a central dispatcher over TCP, receives submission jobs as
//! length-prefixed JSON frames, judges each one on a remote online judge and
//! reports a verdict back on the same connection.

pub mod backends;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod judge;
pub mod node;
pub mod protocol;

pub use config::{ConfigError, Settings, load_config};
pub use error::{JudgerError, JudgerResult};
pub use node::{JudgerHandle, spawn_judger};
