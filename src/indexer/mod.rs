pub mod chunker;
pub mod core;
pub mod languages;
pub mod reader;
pub mod record;
pub mod scan;
