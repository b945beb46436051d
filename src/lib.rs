//! # Codice
//!
//! `codice` is a single-process one-time passcode service. It issues
//! 4-digit codes bound to opaque sessions, verifies them with expiry and
//! single-use enforcement, and pushes every newly issued code to connected
//! Server-Sent Events subscribers in real time.
//!
//! The service is a demo-grade facility by design: codes live in process
//! memory, there is no persistence or transport security, and the admin
//! surface exposes raw code values for inspection.
//!
//! ## Lifecycle of a code
//!
//! 1. `POST /auth/generate-code` mints a session id and a 4-digit code
//!    valid for five minutes, and broadcasts it to all subscribers.
//!    Re-posting with a still-valid `existingSessionId` replays the same
//!    code without a new broadcast.
//! 2. `POST /auth/verify-code` consumes the code exactly once; the used
//!    record lingers for a one-minute grace window so replays answer
//!    "already used", then disappears.
//! 3. A background sweeper evicts expired records once a minute.

pub mod api;
pub mod cli;
pub mod otp;
