mod client;
mod dev_backend;
pub mod domain;
mod error;
pub mod gate;
pub mod overlay;
pub mod ports;
pub mod projector;
mod session;
pub mod store;
pub mod sync;
pub mod window;

pub use client::*;
pub use dev_backend::*;
pub use error::*;
pub use session::*;
