pub mod header_flags;
pub mod helper;
pub mod page_flags;
