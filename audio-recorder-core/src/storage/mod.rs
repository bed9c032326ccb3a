pub mod export_writer;
