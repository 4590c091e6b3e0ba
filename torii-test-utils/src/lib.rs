//! Test doubles shared by the workspace's integration tests.

mod exchange;
mod websocket;

pub use exchange::StubExchange;
pub use websocket::MockStreamServer;
