//! HTTP Handlers

mod generation;
mod ping;
mod story;
mod websocket;

pub use generation::*;
pub use ping::*;
pub use story::*;
pub use websocket::*;
