pub mod index_key;
pub mod metapage;
pub mod posting_fragment;
pub mod row_id;
