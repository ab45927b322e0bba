pub mod address;
pub mod config;
pub mod error;
pub mod models;
pub mod runtime;
pub mod utils;

pub use self::address::*;
pub use self::config::*;
pub use self::error::*;
pub use self::runtime::*;
pub use self::utils::*;
