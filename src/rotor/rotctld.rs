//! Client for rotctld (hamlib rotator daemon) text protocol.
//!
//! Commands are single ASCII lines:
//! `P <az> <el>` sets position, `p` queries it (answer is two lines with
//! azimuth and elevation), `S` stops motion. rotctld answers `P` and `S`
//! with `RPRT <code>` line.
//!
//! Link uses two connections to the daemon. Position and stop commands go
//! to the command connection and their `RPRT` answers are consumed there
//! by background thread. Position queries go to the query connection
//! which carries nothing but `p` and its two answer lines.

use std::{
    io::{Read, Write, ErrorKind},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    thread::JoinHandle,
    time::Duration,
};

use crate::transform::HorizCoord;
use super::{error::*, rotor::Rotor};

pub const DEFAULT_ROTCTLD_PORT: u16 = 4533;

/// Max length of one response line including `\n`
pub const MAX_LINE_LEN: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkTimeouts {
    pub connect: Option<Duration>,
    pub read:    Option<Duration>,
    pub write:   Option<Duration>,
}

/// Connection to rotctld. `S` is the byte stream (`TcpStream` for real link)
pub struct RotctldLink<S: Read + Write = TcpStream> {
    command: Option<S>,
    query:   Option<S>,
    replies: Option<ReplyReader>,
    addr:    String,
}

impl RotctldLink<TcpStream> {
    /// Tries every resolved address (IPv4 and IPv6) until one accepts
    /// connection. Query connection is opened to the same address.
    /// Doesn't retry
    pub fn connect(host: &str, port: u16, timeouts: &LinkTimeouts) -> Result<Self> {
        let host = host.trim().trim_start_matches('[').trim_end_matches(']');
        let addr_str = if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        log::debug!("Connecting to rotctld at {} ...", addr_str);

        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|err| RotorError::ResolutionFailed(addr_str.clone(), err))?;

        let mut last_error = None;
        for addr in addrs {
            let command = match Self::open_stream(&addr, timeouts) {
                Ok(stream) => stream,
                Err(err) => {
                    log::debug!("Connection to {} failed: {}", addr, err);
                    last_error = Some(err);
                    continue;
                }
            };
            // On error opened streams are dropped here and sockets are closed
            let query = Self::open_stream(&addr, timeouts)
                .map_err(|err| RotorError::ConnectFailed(addr_str.clone(), err))?;
            let replies = ReplyReader::start(&command, &addr_str)
                .map_err(|err| RotorError::ConnectFailed(addr_str.clone(), err))?;
            log::info!("Connected to rotctld at {} ({})", addr_str, addr);
            return Ok(Self {
                command: Some(command),
                query:   Some(query),
                replies: Some(replies),
                addr:    addr_str,
            });
        }

        match last_error {
            Some(err) => Err(RotorError::ConnectFailed(addr_str, err)),
            None      => Err(RotorError::NotResolved(addr_str)),
        }
    }

    fn open_stream(addr: &SocketAddr, timeouts: &LinkTimeouts) -> std::io::Result<TcpStream> {
        let stream = match timeouts.connect {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout)?,
            None          => TcpStream::connect(addr)?,
        };
        stream.set_read_timeout(timeouts.read)?;
        stream.set_write_timeout(timeouts.write)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Background reader of `RPRT` answers arriving on command connection
struct ReplyReader {
    stream: TcpStream,
    thread: Option<JoinHandle<()>>,
}

impl ReplyReader {
    fn start(command: &TcpStream, addr: &str) -> std::io::Result<Self> {
        let mut read_stream = command.try_clone()?;
        // Answers can be absent for a long time while tracking
        read_stream.set_read_timeout(None)?;
        let stream = read_stream.try_clone()?;
        let addr = addr.to_string();
        let thread = std::thread::spawn(move || {
            let mut line = Vec::with_capacity(MAX_LINE_LEN);
            loop {
                read_line(&mut read_stream, &mut line);
                if line.is_empty() { break; }
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end();
                if text.starts_with("RPRT") && text != "RPRT 0" {
                    log::warn!("rotctld at {} reported error for command: {}", addr, text);
                } else {
                    log::debug!("rotctld (commands) -> {}", text);
                }
            }
            log::debug!("Reading of rotctld command answers from {} finished", addr);
        });
        Ok(Self {
            stream,
            thread: Some(thread),
        })
    }

    fn stop(mut self) {
        _ = self.stream.shutdown(Shutdown::Both);
        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
    }
}

impl<S: Read + Write> RotctldLink<S> {
    /// Wraps already opened command and query streams
    pub fn from_streams(command: S, query: S, addr: &str) -> Self {
        Self {
            command: Some(command),
            query:   Some(query),
            replies: None,
            addr:    addr.to_string(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Returns command and query streams
    pub fn into_streams(mut self) -> (Option<S>, Option<S>) {
        (self.command.take(), self.query.take())
    }

    fn send(stream: Option<&mut S>, command: &str) -> Result<()> {
        log::debug!("rotctld <- {}", command.trim_end());
        let stream = stream.ok_or(RotorError::NotConnected)?;
        stream.write_all(command.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    fn read_response_line(&mut self, lines_received: usize) -> Result<String> {
        let stream = self.query.as_mut().ok_or(RotorError::NotConnected)?;
        let mut line = Vec::with_capacity(MAX_LINE_LEN);
        read_line(stream, &mut line);
        let text = String::from_utf8_lossy(&line).into_owned();
        if line.last() != Some(&b'\n') {
            if line.len() >= MAX_LINE_LEN {
                // Rest of the line must not be taken for the next answer
                let skipped = skip_rest_of_line(stream);
                log::debug!("rotctld -> too long line, {} more bytes skipped", skipped);
                return Err(ProtocolError::Malformed(text).into());
            }
            log::debug!("rotctld -> {:?} (no end of line)", text);
            return Err(ProtocolError::Truncated(lines_received).into());
        }
        let text = text.trim_end().to_string();
        log::debug!("rotctld -> {}", text);
        Ok(text)
    }
}

impl<S: Read + Write> Drop for RotctldLink<S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Reads stream byte by byte until `\n` (included into `line`), until
/// `MAX_LINE_LEN` bytes read or until stream is closed or failed.
/// Caller detects incomplete line by absence of `\n` at the end
pub fn read_line<R: Read + ?Sized>(stream: &mut R, line: &mut Vec<u8>) {
    line.clear();
    while line.len() < MAX_LINE_LEN {
        let mut byte = [0u8];
        let read = match stream.read(&mut byte) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                log::debug!("rotctld stream read returned {}", err);
                break;
            }
        };
        if read == 0 { break; }
        line.push(byte[0]);
        if byte[0] == b'\n' { break; }
    }
}

/// Skips bytes up to and including `\n`. Returns count of skipped bytes
fn skip_rest_of_line<R: Read + ?Sized>(stream: &mut R) -> usize {
    let mut line = Vec::with_capacity(MAX_LINE_LEN);
    let mut skipped = 0;
    loop {
        read_line(stream, &mut line);
        skipped += line.len();
        if line.len() < MAX_LINE_LEN || line.last() == Some(&b'\n') {
            break;
        }
    }
    skipped
}

fn parse_value(text: &str) -> Result<f64> {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ProtocolError::Malformed(text.to_string()).into()),
    }
}

impl<S: Read + Write> Rotor for RotctldLink<S> {
    fn set_position(&mut self, az: f64, el: f64) -> Result<()> {
        Self::send(self.command.as_mut(), &format!("P {:.2} {:.2}\n", az, el))
    }

    fn get_position(&mut self) -> Result<HorizCoord> {
        Self::send(self.query.as_mut(), "p\n")?;

        let az_str = match self.read_response_line(0) {
            // Error report (`RPRT -n`) is one line; don't wait for the second one
            Ok(text) if text.starts_with("RPRT") =>
                return Err(ProtocolError::Malformed(text).into()),
            Ok(text) => Ok(text),
            // Too long first line is skipped; second line still belongs to this answer
            Err(err @ RotorError::Protocol(ProtocolError::Malformed(_))) => Err(err),
            Err(err) => return Err(err),
        };
        let el_str = self.read_response_line(1)?;

        let az = parse_value(&az_str?)?;
        let el = parse_value(&el_str)?;
        Ok(HorizCoord { az, el })
    }

    fn stop(&mut self) -> Result<()> {
        Self::send(self.command.as_mut(), "S\n")
    }

    fn disconnect(&mut self) {
        if let Some(replies) = self.replies.take() {
            replies.stop();
        }
        let command = self.command.take();
        let query = self.query.take();
        if command.is_some() || query.is_some() {
            log::info!("Disconnected from rotctld at {}", self.addr);
        }
    }

    fn is_connected(&self) -> bool {
        self.command.is_some() && self.query.is_some()
    }
}

#[cfg(test)]
struct MockStream {
    input:      std::io::Cursor<Vec<u8>>,
    output:     Vec<u8>,
    fail_write: bool,
}

#[cfg(test)]
impl MockStream {
    fn new(input: &[u8]) -> Self {
        Self {
            input:      std::io::Cursor::new(input.to_vec()),
            output:     Vec::new(),
            fail_write: false,
        }
    }
}

#[cfg(test)]
impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

#[cfg(test)]
impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.fail_write {
            return Err(std::io::Error::new(ErrorKind::BrokenPipe, "broken pipe"));
        }
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Link with answers for position queries in `query_input`
#[cfg(test)]
fn mock_link(query_input: &[u8]) -> RotctldLink<MockStream> {
    RotctldLink::from_streams(MockStream::new(b""), MockStream::new(query_input), "mock")
}

/// Text written into command and query streams
#[cfg(test)]
fn written_text(link: RotctldLink<MockStream>) -> (String, String) {
    let (command, query) = link.into_streams();
    (
        String::from_utf8(command.unwrap().output).unwrap(),
        String::from_utf8(query.unwrap().output).unwrap(),
    )
}

#[test]
fn test_get_position() {
    let mut link = mock_link(b"123.40\n56.70\n");
    let pos = link.get_position().unwrap();
    assert_eq!(pos.az, 123.4);
    assert_eq!(pos.el, 56.7);
    assert_eq!(written_text(link), (String::new(), "p\n".to_string()));
}

#[test]
fn test_get_position_truncated() {
    let mut link = mock_link(b"123.40\n");
    let result = link.get_position();
    assert!(matches!(result, Err(RotorError::Protocol(ProtocolError::Truncated(1)))));

    let mut link = mock_link(b"");
    let result = link.get_position();
    assert!(matches!(result, Err(RotorError::Protocol(ProtocolError::Truncated(0)))));

    let mut link = mock_link(b"123.40\n56.7");
    let result = link.get_position();
    assert!(matches!(result, Err(RotorError::Protocol(ProtocolError::Truncated(1)))));
}

#[test]
fn test_get_position_malformed() {
    let mut link = mock_link(b"oops\n56.70\n");
    let result = link.get_position();
    assert!(matches!(result, Err(RotorError::Protocol(ProtocolError::Malformed(text))) if text == "oops"));

    let mut link = mock_link(b"12.0\nnan\n");
    let result = link.get_position();
    assert!(matches!(result, Err(RotorError::Protocol(ProtocolError::Malformed(_)))));

    let mut link = mock_link(b"RPRT -1\n");
    let result = link.get_position();
    assert!(matches!(result, Err(RotorError::Protocol(ProtocolError::Malformed(text))) if text == "RPRT -1"));
}

#[test]
fn test_long_line_is_skipped_entirely() {
    let mut input = vec![b'1'; 300];
    input.extend_from_slice(b"\n56.7\n1.5\n2.5\n");
    let mut link = mock_link(&input);
    let result = link.get_position();
    assert!(matches!(result, Err(RotorError::Protocol(ProtocolError::Malformed(_)))));

    // Next answer is read from its own lines, not from the tail of the long one
    let pos = link.get_position().unwrap();
    assert_eq!(pos, HorizCoord::new(1.5, 2.5));

    let mut input = vec![b'1'; 3 * MAX_LINE_LEN];
    input.extend_from_slice(b"\n2\n3\n4\n");
    let mut link = mock_link(&input);
    assert!(link.get_position().is_err());
    assert_eq!(link.get_position().unwrap(), HorizCoord::new(3.0, 4.0));
}

#[test]
fn test_read_line() {
    let mut stream = std::io::Cursor::new(b"1.5\n2.5\r\n3".to_vec());
    let mut line = Vec::new();
    read_line(&mut stream, &mut line);
    assert_eq!(line, b"1.5\n");
    read_line(&mut stream, &mut line);
    assert_eq!(line, b"2.5\r\n");
    read_line(&mut stream, &mut line);
    assert_eq!(line, b"3");
    read_line(&mut stream, &mut line);
    assert!(line.is_empty());

    let mut stream = std::io::Cursor::new(vec![b'x'; 1000]);
    read_line(&mut stream, &mut line);
    assert_eq!(line.len(), MAX_LINE_LEN);
    assert_eq!(skip_rest_of_line(&mut stream), 1000 - MAX_LINE_LEN);
}

#[test]
fn test_set_position_and_stop_commands() {
    let mut link = mock_link(b"");
    link.set_position(12.3, 4.5).unwrap();
    assert_eq!(written_text(link), ("P 12.30 4.50\n".to_string(), String::new()));

    let mut link = mock_link(b"");
    link.stop().unwrap();
    assert_eq!(written_text(link), ("S\n".to_string(), String::new()));

    let mut link = mock_link(b"");
    link.set_position(359.996, -0.5).unwrap();
    link.stop().unwrap();
    assert_eq!(written_text(link), ("P 360.00 -0.50\nS\n".to_string(), String::new()));
}

#[test]
fn test_write_failure_keeps_link() {
    let mut command = MockStream::new(b"");
    command.fail_write = true;
    let mut link = RotctldLink::from_streams(command, MockStream::new(b"1\n2\n"), "mock");
    assert!(matches!(link.set_position(1.0, 2.0), Err(RotorError::Link(_))));
    assert!(matches!(link.stop(), Err(RotorError::Link(_))));
    assert!(link.is_connected());
    assert_eq!(link.get_position().unwrap(), HorizCoord::new(1.0, 2.0));
}

#[test]
fn test_disconnect() {
    let mut link = mock_link(b"1\n2\n");
    assert!(link.is_connected());
    link.disconnect();
    link.disconnect();
    assert!(!link.is_connected());
    assert!(matches!(link.set_position(1.0, 2.0), Err(RotorError::NotConnected)));
    assert!(matches!(link.get_position(), Err(RotorError::NotConnected)));
    assert!(matches!(link.stop(), Err(RotorError::NotConnected)));
}

/// Answers like real rotctld: `RPRT 0` for `P` and `S`, two lines for `p`.
/// N-th position query on a connection is answered with `N*10` and `N`.
/// Returns received commands
#[cfg(test)]
fn answer_rotctld_commands(mut stream: TcpStream) -> Vec<String> {
    let mut received = Vec::new();
    let mut queries = 0;
    let mut line = Vec::new();
    loop {
        read_line(&mut stream, &mut line);
        if line.is_empty() { break; }
        let text = String::from_utf8_lossy(&line).trim_end().to_string();
        let answer = if text == "p" {
            queries += 1;
            format!("{:.6}\n{:.6}\n", queries as f64 * 10.0, queries as f64)
        } else {
            "RPRT 0\n".to_string()
        };
        received.push(text);
        if stream.write_all(answer.as_bytes()).is_err() { break; }
    }
    received
}

#[cfg(test)]
fn check_link_with_server(listener: std::net::TcpListener, host: &str, expected_addr: &str) {
    let port = listener.local_addr().unwrap().port();
    let server = std::thread::spawn(move || {
        let mut connections = Vec::new();
        for _ in 0..2 {
            let (stream, _) = listener.accept().unwrap();
            connections.push(std::thread::spawn(move || answer_rotctld_commands(stream)));
        }
        connections
            .into_iter()
            .map(|conn| conn.join().unwrap())
            .collect::<Vec<_>>()
    });

    let timeouts = LinkTimeouts {
        connect: Some(Duration::from_secs(5)),
        read:    Some(Duration::from_secs(5)),
        write:   Some(Duration::from_secs(5)),
    };
    let mut link = RotctldLink::connect(host, port, &timeouts).unwrap();
    assert_eq!(link.addr(), format!("{}:{}", expected_addr, port));
    assert!(link.is_connected());

    link.set_position(10.0, 20.0).unwrap();
    for n in 1..=3 {
        let pos = link.get_position().unwrap();
        assert_eq!(pos, HorizCoord::new(n as f64 * 10.0, n as f64));
        link.set_position(pos.az, pos.el).unwrap();
    }
    link.stop().unwrap();
    link.disconnect();
    assert!(!link.is_connected());

    let received = server.join().unwrap();
    assert_eq!(received, [
        vec!["P 10.00 20.00", "P 10.00 1.00", "P 20.00 2.00", "P 30.00 3.00", "S"],
        vec!["p", "p", "p"],
    ]);
}

#[test]
fn test_tcp_link_with_command_answers() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    check_link_with_server(listener, "127.0.0.1", "127.0.0.1");
}

#[test]
fn test_tcp_link_ipv6() {
    // Host without IPv6 support
    let Ok(listener) = std::net::TcpListener::bind("[::1]:0") else { return; };
    check_link_with_server(listener, "[::1]", "[::1]");
}

#[test]
fn test_connect_failures() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let result = RotctldLink::connect("127.0.0.1", port, &LinkTimeouts::default());
    assert!(matches!(result, Err(RotorError::ConnectFailed(..))));

    let result = RotctldLink::connect("rotctld.invalid", port, &LinkTimeouts::default());
    assert!(matches!(
        result,
        Err(RotorError::ResolutionFailed(..)) | Err(RotorError::NotResolved(_))
    ));
}
