//! Lab report ingestion pipeline.

pub mod error;
pub mod fingerprint;
pub mod mapper;
pub mod memory;
pub mod normalize;
pub mod orchestrator;
pub mod projection;
pub mod temporal;
pub mod types;

pub use error::*;
pub use fingerprint::*;
pub use mapper::*;
pub use memory::*;
pub use orchestrator::*;
pub use projection::*;
pub use temporal::*;
pub use types::*;
