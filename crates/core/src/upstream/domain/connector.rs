use std::io::{self, Write};

/// Opens the byte stream towards the downstream consumer.
pub trait Connector: Send {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<Box<dyn Write + Send>>;
}
