use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::upstream::domain::connector::Connector;

/// Plain TCP connector. Both timeouts bound how long a stalled consumer can
/// hold up the frame loop.
pub struct TcpConnector {
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            write_timeout,
        }
    }
}

impl Connector for TcpConnector {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<Box<dyn Write + Send>> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(self.write_timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(Box::new(stream));
                }
                Err(e) => {
                    log::debug!("connect to {addr} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{host} did not resolve to any address"),
            )
        }))
    }
}
