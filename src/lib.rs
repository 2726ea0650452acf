pub mod error;
pub mod fetch;
pub mod loki;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod runner;
pub mod stats;
pub mod types;

#[cfg(test)]
mod test_support;
