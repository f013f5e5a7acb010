mod event;
pub mod messages;

pub use event::*;
