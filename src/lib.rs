pub mod params;
pub mod simulate;
pub mod verify;
pub mod config;
pub mod analysis;
pub mod run;
pub mod error;
pub use error::*;
