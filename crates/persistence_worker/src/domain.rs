mod error;
mod handlers;
mod outbound;
mod outcome;
mod processor;
mod worker;

pub use error::*;
pub use handlers::*;
pub use outbound::*;
pub use outcome::*;
pub use processor::*;
pub use worker::*;
