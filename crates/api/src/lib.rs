//! HTTP and WebSocket API: routing, request/response mapping, realtime sessions.

pub mod app;
