pub mod analyzer;
pub mod blueprint;
pub mod chunky;
pub mod company;
pub mod decoder;
mod error;
pub mod event;
pub mod finalizer;
mod replay;
pub mod stream;
pub mod telemetry;
pub mod types;

pub use error::*;
pub use replay::*;
pub use strum;
