// Log streaming: frame decoding and the WebSocket client

pub mod client;
pub mod command;

pub use client::{
    log_stream_url, CommandSink, LogStream, LogStreamClient, LogStreamEvent, LogStreamOpener,
    WebSocketOpener,
};
pub use command::{decode_frame, FrameError, LogCommand};
