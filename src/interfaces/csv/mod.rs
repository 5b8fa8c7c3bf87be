pub mod exchange_reader;
pub mod reply_writer;
