pub mod lab;
pub mod patient;

pub use lab::*;
pub use patient::*;
