//! Best-effort delivery of tracker events to the downstream renderer.
//!
//! Two independent sinks: a live socket (reconnected lazily, at most once
//! per retry period) and an append-only log file. Nothing here ever returns
//! an error to the frame loop once the channel is open; failures are logged
//! and the affected record is dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::shared::constants::{
    STREAM_FRAME_SIZE, STREAM_JPEG_QUALITY, UPSTREAM_CONNECT_TIMEOUT, UPSTREAM_DEFAULT_HOST,
    UPSTREAM_DEFAULT_PORT, UPSTREAM_RETRY_PERIOD, UPSTREAM_WRITE_TIMEOUT,
};
use crate::shared::frame::Frame;
use crate::tracking::domain::effect_event::EffectEvent;
use crate::upstream::domain::connector::Connector;
use crate::upstream::domain::frame_encoder::FrameEncoder;
use crate::upstream::domain::upstream_record::{UpstreamRecord, WireFormat};

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("cannot connect to upstream {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("upstream write failed: {0}")]
    Write(#[source] io::Error),
    #[error("cannot encode upstream record: {0}")]
    Encode(String),
    #[error("cannot open upstream log {}: {source}", path.display())]
    OpenLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamConfig {
    pub host: String,
    /// `None` disables the socket sink.
    pub port: Option<u16>,
    pub log_path: Option<PathBuf>,
    /// Embed the current video frame in every event record.
    pub stream_frames: bool,
    pub wire_format: WireFormat,
    /// Minimum spacing between connect attempts after a failure.
    pub retry_period: Duration,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub frame_size: (u32, u32),
    pub jpeg_quality: u8,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: UPSTREAM_DEFAULT_HOST.to_string(),
            port: Some(UPSTREAM_DEFAULT_PORT),
            log_path: None,
            stream_frames: false,
            wire_format: WireFormat::JsonLines,
            retry_period: UPSTREAM_RETRY_PERIOD,
            connect_timeout: UPSTREAM_CONNECT_TIMEOUT,
            write_timeout: UPSTREAM_WRITE_TIMEOUT,
            frame_size: STREAM_FRAME_SIZE,
            jpeg_quality: STREAM_JPEG_QUALITY,
        }
    }
}

pub struct UpstreamChannel {
    config: UpstreamConfig,
    connector: Box<dyn Connector>,
    encoder: Box<dyn FrameEncoder>,
    socket: Option<Box<dyn Write + Send>>,
    log: Option<BufWriter<File>>,
    last_failure: Option<Instant>,
    connect_attempts: u64,
    closed: bool,
}

impl UpstreamChannel {
    /// Opens the log sink (the only fatal failure) and makes a first
    /// connect attempt when a port is configured.
    pub fn open(
        config: UpstreamConfig,
        connector: Box<dyn Connector>,
        encoder: Box<dyn FrameEncoder>,
    ) -> Result<Self, UpstreamError> {
        let log = config.log_path.as_deref().map(open_log).transpose()?;
        let mut channel = Self {
            config,
            connector,
            encoder,
            socket: None,
            log,
            last_failure: None,
            connect_attempts: 0,
            closed: false,
        };
        if channel.config.port.is_some() {
            channel.try_connect(Instant::now());
        }
        Ok(channel)
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Points the socket sink at `host:port` and tries to connect right away.
    /// Returns whether a connection was established.
    pub fn connect(&mut self, host: &str, port: u16) -> bool {
        self.config.host = host.to_string();
        self.config.port = Some(port);
        self.socket = None;
        self.try_connect(Instant::now())
    }

    pub fn send(&mut self, event: &EffectEvent, frame: Option<&Frame>) {
        self.send_at(event, frame, Instant::now());
    }

    /// [`send`](Self::send) with an explicit clock, which drives the
    /// reconnect cooldown.
    pub fn send_at(&mut self, event: &EffectEvent, frame: Option<&Frame>, now: Instant) {
        if self.closed {
            return;
        }
        self.reconnect_if_due(now);
        if !self.has_sink() {
            return;
        }

        let mut record = UpstreamRecord::from_event(event);
        if self.config.stream_frames {
            if let Some(frame) = frame {
                match self.encoder.encode_frame(frame) {
                    Ok(encoded) => record = record.with_frame(encoded),
                    Err(e) => log::warn!("sending {} without frame: {e}", event.kind()),
                }
            }
        }
        log::debug!("upstream <- {}", event.kind());
        self.deliver(&record, now);
    }

    /// Sends an extracted face image as its own `face` record.
    pub fn send_face(&mut self, face: &Frame) {
        if self.closed {
            return;
        }
        let now = Instant::now();
        self.reconnect_if_due(now);
        if !self.has_sink() {
            return;
        }
        match self.encoder.encode_face(face) {
            Ok(encoded) => {
                log::debug!("upstream <- face {}x{}", face.width(), face.height());
                self.deliver(&UpstreamRecord::face(encoded), now);
            }
            Err(e) => log::warn!("dropping face image: {e}"),
        }
    }

    /// Releases both sinks. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.flush() {
                log::debug!("failed to flush upstream socket: {e}");
            }
        }
        if let Some(mut file) = self.log.take() {
            if let Err(e) = file.flush() {
                log::warn!("failed to flush upstream log: {e}");
            }
        }
        log::info!("upstream closed");
    }

    fn has_sink(&self) -> bool {
        self.socket.is_some() || self.log.is_some()
    }

    fn reconnect_if_due(&mut self, now: Instant) {
        if self.socket.is_some() || self.config.port.is_none() {
            return;
        }
        let due = self
            .last_failure
            .map_or(true, |t| now.saturating_duration_since(t) >= self.config.retry_period);
        if due {
            self.try_connect(now);
        }
    }

    fn try_connect(&mut self, now: Instant) -> bool {
        let Some(port) = self.config.port else {
            return false;
        };
        self.connect_attempts += 1;
        match self.connector.connect(&self.config.host, port) {
            Ok(socket) => {
                log::info!("connected to upstream {}:{port}", self.config.host);
                self.socket = Some(socket);
                self.last_failure = None;
                true
            }
            Err(source) => {
                let err = UpstreamError::Connect {
                    host: self.config.host.clone(),
                    port,
                    source,
                };
                log::warn!("{err}");
                self.last_failure = Some(now);
                false
            }
        }
    }

    fn deliver(&mut self, record: &UpstreamRecord, now: Instant) {
        let bytes = match record.encode(self.config.wire_format) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("{}", UpstreamError::Encode(e.to_string()));
                return;
            }
        };

        let socket_error = self
            .socket
            .as_mut()
            .and_then(|s| s.write_all(&bytes).and_then(|()| s.flush()).err());
        if let Some(e) = socket_error {
            log::warn!("{}, dropping connection", UpstreamError::Write(e));
            self.socket = None;
            // a lost connection counts as a failed attempt for the cooldown
            self.last_failure = Some(now);
        }

        let log_error = self
            .log
            .as_mut()
            .and_then(|f| f.write_all(&bytes).and_then(|()| f.flush()).err());
        if let Some(e) = log_error {
            log::warn!("upstream log write failed, closing log: {e}");
            // discard the buffered record instead of flushing it on drop
            if let Some(file) = self.log.take() {
                drop(file.into_parts());
            }
        }
    }
}

impl Drop for UpstreamChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_log(path: &Path) -> Result<BufWriter<File>, UpstreamError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| UpstreamError::OpenLog {
            path: path.to_path_buf(),
            source,
        })?;
    log::info!("opened upstream log {}", path.display());
    Ok(BufWriter::new(file))
}
