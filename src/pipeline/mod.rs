pub mod cancel;
pub mod extraction;
pub mod labs;

pub use cancel::CancelToken;
