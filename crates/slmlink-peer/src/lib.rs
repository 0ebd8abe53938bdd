//! Confirmed frame delivery between a producer and a remote display.
//!
//! A [`StreamClient`] compresses each frame, sends it as one length-prefixed
//! message and optionally waits for the peer's `done`/`err` reply, resending
//! the whole frame on failure. A [`StreamServer`] is the receiving end: it
//! decompresses, checks the size against the expected shape and answers.

pub mod ack;
pub mod client;
pub mod error;
pub mod server;

pub use ack::{Ack, ACK_CHUNK_SIZE};
pub use client::{ClientConfig, SendReport, StreamClient, DEFAULT_RETRIES, DEFAULT_TIMEOUT};
pub use error::{AttemptFailure, PeerError, Result};
pub use server::{ServeSummary, ServerConfig, StreamServer, StreamSession, DEFAULT_SERVE_POLL};
