pub mod config;
pub mod scan;

pub use config::*;
pub use scan::*;
