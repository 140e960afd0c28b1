//! Session behavior tests

mod lifecycle_tests;
mod websocket_tests;
