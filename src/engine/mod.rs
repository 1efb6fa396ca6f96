pub mod accumulator;
pub mod builder;
pub mod reader;
pub mod scan;
pub mod serializer;
