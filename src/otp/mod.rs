//! One-time passcode domain: store, issuing/verification, broadcast fan-out,
//! and background expiry sweeping.

pub mod broadcast;
pub mod service;
pub mod store;
pub mod sweeper;
