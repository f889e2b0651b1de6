//! Presence services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! `registry` and `channels` are plain owned data structures with no locking.
//! `hub` owns both behind one lock and emits a change event per mutation.
//! `broadcast` listens for those events and fans the full snapshot out.

pub mod broadcast;
pub mod channels;
pub mod hub;
pub mod registry;
