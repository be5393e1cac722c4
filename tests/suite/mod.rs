//! End-to-end chat scenarios wiring the real client, session and store together.

mod chat_flow;
mod offline_persistence;
