use crate::domain::gateway::Reply;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRecord<'a> {
    session_id: &'a str,
    reply: String,
}

/// Writes `sessionId,reply` rows. Multi-line replies are quoted.
pub struct ReplyWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReplyWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_reply(&mut self, session_id: &str, reply: &Reply) -> Result<()> {
        self.writer.serialize(ReplyRecord {
            session_id,
            reply: reply.to_string(),
        })?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
