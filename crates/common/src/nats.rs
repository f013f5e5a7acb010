mod client;
mod stream_reader;
mod stream_writer;
mod trace_context;
mod traits;

pub use client::*;
pub use stream_reader::*;
pub use stream_writer::*;
pub use trace_context::*;
pub use traits::*;
