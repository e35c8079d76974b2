use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, warn};

use crate::error::{LabelError, Result};
use crate::types::{CanId, Frame, FrameData};

/// Frames recovered from a log, plus how many lines had to be dropped
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    pub frames: Vec<Frame>,
    pub skipped: usize,
}

/// Parses one candump line.
///
/// Accepts `(ts) iface ID [dlc] b0 b1 ...` and the compact
/// `(ts) iface ID#DATA` form. Blank lines yield `Ok(None)`.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<Frame>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    parse_fields(line)
        .map(Some)
        .map_err(|reason| LabelError::parse(line_no, reason))
}

fn parse_fields(line: &str) -> std::result::Result<Frame, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(format!("expected at least 3 fields, found {}", tokens.len()));
    }

    let raw_ts = tokens[0].trim_matches(|c| c == '(' || c == ')');
    let timestamp = raw_ts
        .parse::<f64>()
        .map_err(|_| format!("invalid timestamp '{}'", tokens[0]))?;
    let interface = tokens[1].to_string();

    let (id, data) = match tokens[2].split_once('#') {
        Some((id, payload)) => (parse_id(id)?, parse_compact_payload(payload)?),
        None => {
            let id = parse_id(tokens[2])?;
            let dlc_token = tokens
                .get(3)
                .ok_or_else(|| "missing data length".to_string())?;
            let dlc = dlc_token
                .trim_matches(|c| c == '[' || c == ']')
                .parse::<usize>()
                .map_err(|_| format!("invalid data length '{}'", dlc_token))?;
            let end = tokens.len().min(4 + dlc);
            let data = tokens[4.min(end)..end]
                .iter()
                .map(|b| parse_byte(b))
                .collect::<std::result::Result<FrameData, String>>()?;
            (id, data)
        }
    };

    Ok(Frame {
        id,
        data,
        timestamp,
        interface,
    })
}

fn parse_id(token: &str) -> std::result::Result<CanId, String> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid CAN identifier '{}'", token));
    }
    CanId::from_str_radix(token, 16).map_err(|_| format!("invalid CAN identifier '{}'", token))
}

fn parse_byte(token: &str) -> std::result::Result<u8, String> {
    if token.is_empty() || token.len() > 2 || !token.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid data byte '{}'", token));
    }
    u8::from_str_radix(token, 16).map_err(|_| format!("invalid data byte '{}'", token))
}

fn parse_compact_payload(payload: &str) -> std::result::Result<FrameData, String> {
    // Remote frames carry no data
    if payload.starts_with('R') {
        return Ok(Vec::new());
    }
    // CAN FD: '#' followed by a single flags nibble
    let payload = match payload.strip_prefix('#') {
        Some(fd) => fd.get(1..).unwrap_or(""),
        None => payload,
    };
    let payload: String = payload.chars().filter(|c| *c != '.').collect();
    if !payload.is_ascii() || payload.len() % 2 != 0 {
        return Err(format!("invalid payload '{}'", payload));
    }
    (0..payload.len())
        .step_by(2)
        .map(|i| parse_byte(&payload[i..i + 2]))
        .collect()
}

/// Iterator over the frames of a candump log
pub struct CandumpReader<R: BufRead> {
    reader: R,
    line_no: usize,
    buf: String,
}

impl<R: BufRead> CandumpReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }

    /// Number of lines consumed so far
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for CandumpReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    match parse_line(self.line_no, &self.buf) {
                        Ok(Some(frame)) => return Some(Ok(frame)),
                        Ok(None) => continue,
                        Err(e) => return Some(Err(e)),
                    }
                }
                Err(e) => return Some(Err(LabelError::Io(e))),
            }
        }
    }
}

/// Reads every frame from `reader`, skipping malformed lines
pub fn read_frames_from<R: BufRead>(reader: R) -> Result<ParsedLog> {
    let mut log = ParsedLog::default();
    let mut reader = CandumpReader::new(reader);
    for item in reader.by_ref() {
        match item {
            Ok(frame) => log.frames.push(frame),
            Err(LabelError::Parse { line, reason }) => {
                warn!("Failed to parse line {}: {}", line, reason);
                log.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    debug!(
        "Read {} lines: {} frames, {} skipped",
        reader.line_no(),
        log.frames.len(),
        log.skipped
    );
    Ok(log)
}

/// Reads a candump log file
pub fn read_frames<P: AsRef<Path>>(path: P) -> Result<ParsedLog> {
    let file = File::open(path)?;
    read_frames_from(BufReader::new(file))
}
