/// Network layer: line transport, ANSI colouring and the TCP server
///
/// The core treats "read a line" and "write a line" as atomic primitives;
/// this module supplies them over any async byte stream.

pub mod ansi;
pub mod line;
pub mod server;

// Re-export commonly used types
pub use ansi::{colorize, Color, ColorMode};
pub use line::{line_transport, InputMode, LineReader, Output};
pub use server::{handle_connection, Server};
