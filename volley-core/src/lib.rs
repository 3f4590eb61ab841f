mod config;
mod constants;
mod outcome;
mod policy;
mod stats;

pub use config::*;
pub use constants::*;
pub use outcome::*;
pub use policy::*;
pub use stats::*;
