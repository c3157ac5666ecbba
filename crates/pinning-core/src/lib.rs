pub mod action;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod resolve;
pub mod rewrite;
pub mod workflow;

pub use error::{PinError, Result};
