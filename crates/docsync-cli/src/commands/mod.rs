//! One module per command group

pub mod bind;
pub mod console;
pub mod daemon;
pub mod status;
