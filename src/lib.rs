pub mod config;
pub mod geo;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod sink;
