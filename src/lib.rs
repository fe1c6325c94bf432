pub mod config;
pub mod control;
pub mod error;
pub mod flow;
pub mod ports;
pub mod topo;
pub mod weights;

pub use error::Error;

#[cfg(test)]
mod test;
