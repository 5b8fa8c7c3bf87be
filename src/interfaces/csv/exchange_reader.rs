use crate::domain::gateway::UssdRequest;
use crate::error::{Result, UssdError};
use std::io::Read;

/// Reads recorded gateway exchanges from a CSV source.
///
/// Expects the header `sessionId,serviceCode,phoneNumber,text`. Fields are
/// trimmed; a row with the wrong number of fields is reported as an error
/// and the rows after it are still read.
pub struct ExchangeReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ExchangeReader<R> {
    /// Creates a new `ExchangeReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes exchanges in
    /// file order.
    pub fn exchanges(self) -> impl Iterator<Item = Result<UssdRequest>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(UssdError::from))
    }
}
