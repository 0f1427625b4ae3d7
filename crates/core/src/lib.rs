pub mod color;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod git;
pub mod human;
pub mod layout;
pub mod model;
pub mod pack;
pub mod progress;
pub mod scanner;
pub mod search;
pub mod surface;
pub mod zoom;

pub use error::{Error, Result};
pub use layout::*;
pub use model::*;
pub use progress::*;
pub use scanner::*;
