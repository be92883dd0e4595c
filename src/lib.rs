pub mod api;
pub mod blocks;
pub mod config;
pub mod error;
pub mod io;
pub mod likelihood;
pub mod locs;
pub mod matrix;
pub mod search;
pub mod spectrum;
pub mod stats;
// cmd and reports belong to the binary (main.rs).
