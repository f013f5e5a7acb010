pub mod domain;
pub mod persistence_worker;

pub use domain::*;
pub use persistence_worker::*;
