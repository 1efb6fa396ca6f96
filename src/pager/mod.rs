pub mod pager;
pub mod redo_log;
