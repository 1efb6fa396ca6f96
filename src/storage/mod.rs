pub mod data_page_header;
pub mod page;
pub mod page_header;
pub mod page_opaque;
pub mod page_store;
pub mod slot;
