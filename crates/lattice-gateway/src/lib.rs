//! HTTP gateway for the Lattice runtime: project auth, session and message
//! endpoints, learning-space management, and the JSON error envelope. The
//! binary in `main.rs` wires this router to the process lifecycle.

pub mod app;
pub mod auth;
pub mod error;
pub mod http;
