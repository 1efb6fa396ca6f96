pub mod header;
pub mod options;
