//! Parley library exports for testing

pub mod cli;
pub mod core;
pub mod transport;

#[cfg(test)]
pub mod test_support;
