pub mod table_error;
pub mod table_reader;
pub mod table_writer;
