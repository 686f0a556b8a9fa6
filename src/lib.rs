pub mod cli;
pub mod commands;
pub mod ends;
pub mod events;
pub mod gene;
pub mod graph;
pub mod orf;
pub mod utils;
