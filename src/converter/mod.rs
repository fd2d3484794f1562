//! Streaming conversion of XML unload dumps into CSV.
//!
//! [`DumpReader`] pulls rows out of an unload document one at a time,
//! [`TableCsvWriter`] freezes the column set on the first row, and
//! [`DumpConverter`] ties the two together for one file. [`convert_files`]
//! runs a batch and keeps going when a single file fails.

mod batch;
mod csv_writer;
mod dump_converter;
mod dump_reader;
mod source;

// Re-export public API
pub use batch::{convert_files, BatchSummary};
pub use csv_writer::TableCsvWriter;
pub use dump_converter::DumpConverter;
pub use dump_reader::DumpReader;
pub use source::{csv_path_for, find_dumps, is_compressed, is_dump_file, open_dump};
