pub mod delimited_table_reader;
pub mod tsv_table_writer;
