pub mod engine;
pub mod errors;
pub mod outcome;
pub mod parameters;
pub mod point;
pub mod termination;

pub use engine::*;
pub use errors::*;
pub use outcome::*;
pub use parameters::*;
pub use point::*;
pub use termination::*;
