pub mod allocation_reader;
pub mod investor_reader;
pub mod register_writer;
