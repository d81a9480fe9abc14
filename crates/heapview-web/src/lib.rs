//! Remote viewer server for heapview.
//!
//! Viewers connect to `/debug` over WebSocket. They get the current diagram
//! on connect and again after every snapshot, and may send an object id at
//! any time to receive a one-level expansion of that object.

pub mod app;
pub mod http;
