//! Concrete remote judge backends.

pub mod hdu;

pub use hdu::HduBackend;
