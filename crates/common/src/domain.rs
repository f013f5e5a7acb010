mod event;
mod failed_event;
mod persistence;
mod result;
mod stream;

pub use event::*;
pub use failed_event::*;
pub use persistence::*;
pub use result::*;
pub use stream::*;
