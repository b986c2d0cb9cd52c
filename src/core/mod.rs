pub mod completion;
pub mod config;
pub mod session;
pub mod speech;
