pub mod cnet;
pub mod config;
pub mod constants;
pub mod cube;
pub mod decompress;
pub mod drivers;
pub mod geometry;
pub mod import;
pub mod ingest;
pub mod ingest_errors;
pub mod label;
pub mod serial;
pub mod spice;
pub mod table;
pub mod translation;
