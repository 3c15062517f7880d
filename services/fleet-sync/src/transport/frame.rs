//! STOMP 1.2 frame codec
//!
//! ```text
//! COMMAND EOL
//! (header ":" value EOL)*
//! EOL
//! body NUL
//! ```
//!
//! EOL is `\n` or `\r\n`. Bare EOLs between frames are heart-beats and are
//! skipped. Header values are escaped (`\\`, `\n`, `\r`, `\c`) on every
//! frame except CONNECT and CONNECTED.

use std::fmt;

/// Largest frame accepted, headers and body included.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Frame commands used by a subscribing client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONNECT" => Some(Command::Connect),
            "CONNECTED" => Some(Command::Connected),
            "SUBSCRIBE" => Some(Command::Subscribe),
            "UNSUBSCRIBE" => Some(Command::Unsubscribe),
            "DISCONNECT" => Some(Command::Disconnect),
            "MESSAGE" => Some(Command::Message),
            "RECEIPT" => Some(Command::Receipt),
            "ERROR" => Some(Command::Error),
            _ => None,
        }
    }

    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors while parsing a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed header line: {0}")]
    MalformedHeader(String),

    #[error("frame is not terminated by NUL")]
    Unterminated,

    #[error("content-length {0} exceeds the frame limit")]
    InvalidContentLength(usize),

    #[error("no NUL after content-length body")]
    LengthMismatch,

    #[error("partial frame exceeds the frame limit")]
    Oversized,

    #[error("frame headers are not valid UTF-8")]
    InvalidUtf8,
}

/// One STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// CONNECT frame; heart-beating is disabled in both directions.
    pub fn connect(host: &str) -> Self {
        Frame::new(Command::Connect)
            .with_header("accept-version", "1.2")
            .with_header("host", host)
            .with_header("heart-beat", "0,0")
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    pub fn disconnect(receipt: &str) -> Self {
        Frame::new(Command::Disconnect).with_header("receipt", receipt)
    }

    /// First value of a header. Repeated headers keep the first occurrence.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize to wire bytes, including the trailing NUL.
    pub fn encode(&self) -> Vec<u8> {
        let escape = self.command.escapes_headers();
        let mut out = Vec::with_capacity(64 + self.body.len());

        out.extend_from_slice(self.command.as_str().as_bytes());
        out.push(b'\n');
        for (name, value) in &self.headers {
            if escape {
                out.extend_from_slice(escape_header(name).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape_header(value).as_bytes());
            } else {
                out.extend_from_slice(name.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }
        if !self.body.is_empty() && self.header("content-length").is_none() {
            out.extend_from_slice(format!("content-length:{}\n", self.body.len()).as_bytes());
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }

    /// Encode as text for a WebSocket text message.
    pub fn encode_text(&self) -> String {
        String::from_utf8_lossy(&self.encode()).into_owned()
    }
}

/// Parse every frame in `data`. Heart-beat EOLs produce no frames.
pub fn parse_frames(data: &[u8]) -> Result<Vec<Frame>, FrameError> {
    let mut frames = Vec::new();
    let mut rest = data;

    loop {
        rest = skip_eols(rest);
        if rest.is_empty() {
            return Ok(frames);
        }
        let (frame, consumed) = parse_one(rest)?;
        frames.push(frame);
        rest = &rest[consumed..];
    }
}

/// Reassembles frames that arrive split across transport messages.
///
/// Bytes are appended with [`FrameBuffer::extend`] and complete frames are
/// drained with [`FrameBuffer::next_frame`]. An incomplete trailing frame
/// stays buffered until the rest arrives.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Bytes waiting for the rest of their frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Next complete frame, or `None` until more bytes arrive.
    ///
    /// On error the buffered bytes are discarded so the next message starts
    /// from a clean frame boundary.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let heartbeats = self.pending.len() - skip_eols(&self.pending).len();
        self.pending.drain(..heartbeats);
        if self.pending.is_empty() {
            return Ok(None);
        }

        match parse_one(&self.pending) {
            Ok((frame, consumed)) => {
                self.pending.drain(..consumed);
                Ok(Some(frame))
            }
            Err(FrameError::Unterminated) if self.pending.len() <= MAX_FRAME_LEN => Ok(None),
            Err(FrameError::Unterminated) => {
                self.pending.clear();
                Err(FrameError::Oversized)
            }
            Err(e) => {
                self.pending.clear();
                Err(e)
            }
        }
    }
}

fn skip_eols(mut data: &[u8]) -> &[u8] {
    while let Some((&first, tail)) = data.split_first() {
        if first == b'\n' || first == b'\r' {
            data = tail;
        } else {
            break;
        }
    }
    data
}

/// Parse one frame starting at `data[0]`; returns it and the bytes consumed.
fn parse_one(data: &[u8]) -> Result<(Frame, usize), FrameError> {
    let mut pos = 0;

    let command_line = read_line(data, &mut pos)?;
    let command = Command::parse(command_line)
        .ok_or_else(|| FrameError::UnknownCommand(command_line.to_string()))?;

    let mut headers = Vec::new();
    loop {
        let line = read_line(data, &mut pos)?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
        if command.escapes_headers() {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.trim().parse::<usize>().ok());

    let body_end = match content_length {
        Some(len) => {
            let end = pos
                .checked_add(len)
                .filter(|&end| end <= MAX_FRAME_LEN)
                .ok_or(FrameError::InvalidContentLength(len))?;
            match data.get(end) {
                Some(0) => end,
                Some(_) => return Err(FrameError::LengthMismatch),
                None => return Err(FrameError::Unterminated),
            }
        }
        None => data[pos..]
            .iter()
            .position(|&b| b == 0)
            .map(|offset| pos + offset)
            .ok_or(FrameError::Unterminated)?,
    };

    let frame = Frame {
        command,
        headers,
        body: data[pos..body_end].to_vec(),
    };
    Ok((frame, body_end + 1))
}

/// Read one EOL-terminated line as UTF-8, advancing `pos` past the EOL.
fn read_line<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a str, FrameError> {
    let start = *pos;
    let offset = data[start..]
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(FrameError::Unterminated)?;
    *pos = start + offset + 1;

    let mut line = &data[start..start + offset];
    if let Some((&b'\r', head)) = line.split_last() {
        line = head;
    }
    std::str::from_utf8(line).map_err(|_| FrameError::InvalidUtf8)
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(s: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::MalformedHeader(s.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_connect() {
        let bytes = Frame::connect("localhost").encode();
        assert_eq!(
            bytes,
            b"CONNECT\naccept-version:1.2\nhost:localhost\nheart-beat:0,0\n\n\0".to_vec()
        );
    }

    #[test]
    fn test_encode_subscribe() {
        let text = Frame::subscribe("sub-0", "/topic/updates").encode_text();
        assert_eq!(
            text,
            "SUBSCRIBE\nid:sub-0\ndestination:/topic/updates\nack:auto\n\n\0"
        );
    }

    #[test]
    fn test_parse_connected() {
        let frames = parse_frames(b"CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, Command::Connected);
        assert_eq!(frames[0].header("version"), Some("1.2"));
    }

    #[test]
    fn test_parse_message_body() {
        let raw = b"MESSAGE\ndestination:/topic/updates\nsubscription:sub-0\nmessage-id:1\ncontent-type:application/json\n\n{\"truckId\":\"T1\",\"latitude\":1,\"longitude\":2}\0";
        let frames = parse_frames(raw).unwrap();
        assert_eq!(frames[0].command, Command::Message);
        assert_eq!(frames[0].header("subscription"), Some("sub-0"));
        assert_eq!(
            frames[0].body,
            br#"{"truckId":"T1","latitude":1,"longitude":2}"#.to_vec()
        );
    }

    #[test]
    fn test_parse_content_length_body_with_nul() {
        let raw = b"MESSAGE\ncontent-length:3\n\na\0b\0";
        let frames = parse_frames(raw).unwrap();
        assert_eq!(frames[0].body, b"a\0b".to_vec());
    }

    #[test]
    fn test_parse_crlf_and_heartbeats() {
        let raw = b"\n\r\nMESSAGE\r\ndestination:/topic/updates\r\n\r\nhi\0\n";
        let frames = parse_frames(raw).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header("destination"), Some("/topic/updates"));
        assert_eq!(frames[0].body, b"hi".to_vec());
    }

    #[test]
    fn test_heartbeat_only_yields_nothing() {
        assert!(parse_frames(b"\n").unwrap().is_empty());
        assert!(parse_frames(b"").unwrap().is_empty());
    }

    #[test]
    fn test_parse_multiple_frames() {
        let raw = b"MESSAGE\n\none\0MESSAGE\n\ntwo\0";
        let frames = parse_frames(raw).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].body, b"two".to_vec());
    }

    #[test]
    fn test_error_frame() {
        let raw = b"ERROR\nmessage:Invalid destination\\cfoo\n\n\0";
        let frames = parse_frames(raw).unwrap();
        assert_eq!(frames[0].command, Command::Error);
        assert_eq!(frames[0].header("message"), Some("Invalid destination:foo"));
    }

    #[test]
    fn test_header_escaping_round_trip() {
        let frame = Frame::new(Command::Message)
            .with_header("note", "a:b\nc\\d")
            .with_body("x");
        let parsed = parse_frames(&frame.encode()).unwrap();
        assert_eq!(parsed[0].header("note"), Some("a:b\nc\\d"));
        assert_eq!(parsed[0].body, b"x".to_vec());
    }

    #[test]
    fn test_unknown_command() {
        let err = parse_frames(b"BOGUS\n\n\0").unwrap_err();
        assert_eq!(err, FrameError::UnknownCommand("BOGUS".to_string()));
    }

    #[test]
    fn test_unterminated() {
        assert_eq!(
            parse_frames(b"MESSAGE\n\nbody").unwrap_err(),
            FrameError::Unterminated
        );
        assert_eq!(
            parse_frames(b"MESSAGE\nfoo:bar").unwrap_err(),
            FrameError::Unterminated
        );
    }

    #[test]
    fn test_huge_content_length_is_rejected() {
        let raw = b"CONNECTED\ncontent-length:18446744073709551615\n\n\0";
        assert_eq!(
            parse_frames(raw).unwrap_err(),
            FrameError::InvalidContentLength(usize::MAX)
        );

        let raw = format!("MESSAGE\ncontent-length:{}\n\n\0", MAX_FRAME_LEN);
        assert_eq!(
            parse_frames(raw.as_bytes()).unwrap_err(),
            FrameError::InvalidContentLength(MAX_FRAME_LEN)
        );
    }

    #[test]
    fn test_content_length_without_nul() {
        let err = parse_frames(b"MESSAGE\ncontent-length:1\n\nab\0").unwrap_err();
        assert_eq!(err, FrameError::LengthMismatch);
    }

    #[test]
    fn test_buffer_joins_split_frame() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(b"MESSAGE\nsubscription:sub-0\n\n{\"truckId\":");
        assert_eq!(buffer.next_frame().unwrap(), None);
        assert!(buffer.pending_len() > 0);

        buffer.extend(b"\"T1\"}\0\n");
        let frame = buffer.next_frame().unwrap().unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.body, br#"{"truckId":"T1"}"#.to_vec());
        assert_eq!(buffer.next_frame().unwrap(), None);
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_buffer_split_inside_headers_and_content_length_body() {
        let raw = b"MESSAGE\r\ncontent-length:3\r\n\r\na\0b\0MESSAGE\n\ntwo\0";
        let mut buffer = FrameBuffer::new();
        let mut bodies = Vec::new();
        for chunk in raw.chunks(5) {
            buffer.extend(chunk);
            while let Some(frame) = buffer.next_frame().unwrap() {
                bodies.push(frame.body);
            }
        }
        assert_eq!(bodies, vec![b"a\0b".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_buffer_recovers_after_bad_frame() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(b"BOGUS\n\n\0MESSAGE\n\nlost\0");
        assert_eq!(
            buffer.next_frame().unwrap_err(),
            FrameError::UnknownCommand("BOGUS".to_string())
        );
        assert_eq!(buffer.pending_len(), 0);

        buffer.extend(b"MESSAGE\n\nok\0");
        assert_eq!(buffer.next_frame().unwrap().unwrap().body, b"ok".to_vec());
    }

    #[test]
    fn test_buffer_drops_oversized_partial_frame() {
        let mut buffer = FrameBuffer::new();
        buffer.extend(b"MESSAGE\n\n");
        buffer.extend(&vec![b'x'; MAX_FRAME_LEN]);
        assert_eq!(buffer.next_frame().unwrap_err(), FrameError::Oversized);
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_malformed_header() {
        let err = parse_frames(b"MESSAGE\nnocolon\n\n\0").unwrap_err();
        assert_eq!(err, FrameError::MalformedHeader("nocolon".to_string()));
    }
}
