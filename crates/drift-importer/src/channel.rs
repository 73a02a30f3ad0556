use std::io::{self, Read, Write};

use tracing::{trace, warn};

use crate::{ImportError, Result};

/// Size of the fixed chunk header on the wire.
pub const HEADER_SIZE: usize = 16;

/// Request a full commit manifest. Body: revision name, UTF-8.
pub const CMD_MANIFEST: u32 = 1;
/// Request one file's contents. Body: `rev[20] || path`.
pub const CMD_CAT_FILE: u32 = 2;

/// More chunks follow for the same response.
pub const FLAG_MORE_CHUNKS: u32 = 0x1;
/// The chunk body is a UTF-8 error message.
pub const FLAG_ERROR: u32 = 0x2;

/// Fixed-size header preceding every chunk, big-endian on the wire.
#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    pub request_id: u32,
    pub command: u32,
    pub flags: u32,
    pub data_length: u32,
}

impl ChunkHeader {
    pub fn has_more_chunks(&self) -> bool {
        self.flags & FLAG_MORE_CHUNKS != 0
    }

    pub fn is_error(&self) -> bool {
        self.flags & FLAG_ERROR != 0
    }

    fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        let field = |i: usize| {
            u32::from_be_bytes(bytes[i * 4..i * 4 + 4].try_into().expect("four bytes"))
        };
        Self {
            request_id: field(0),
            command: field(1),
            flags: field(2),
            data_length: field(3),
        }
    }

    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.request_id.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.command.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.flags.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.data_length.to_be_bytes());
        bytes
    }
}

/// Length-prefixed message transport over a pair of byte streams.
///
/// Outbound requests go to the writer (the helper's stdin), responses
/// come back on the reader (its stdout). One logical request is in
/// flight at a time; request ids are allocated monotonically from 1 so
/// a future pipelined protocol could demultiplex responses.
pub struct FramedChannel<R, W> {
    reader: R,
    writer: Option<W>,
    next_request_id: u32,
}

impl<R: Read, W: Write> FramedChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer: Some(writer),
            next_request_id: 1,
        }
    }

    /// Send one request: header plus payload segments, as a single
    /// gathered write. Returns the assigned request id.
    pub fn send_request(&mut self, command: u32, segments: &[&[u8]]) -> Result<u32> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ImportError::ChannelClosed(io::ErrorKind::BrokenPipe.into()))?;

        let data_length: usize = segments.iter().map(|s| s.len()).sum();
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let header = ChunkHeader {
            request_id,
            command,
            flags: 0,
            data_length: data_length as u32,
        };

        let mut message = Vec::with_capacity(HEADER_SIZE + data_length);
        message.extend_from_slice(&header.encode());
        for segment in segments {
            message.extend_from_slice(segment);
        }

        writer
            .write_all(&message)
            .and_then(|_| writer.flush())
            .map_err(ImportError::ChannelClosed)?;

        trace!(request_id, command, data_length, "sent request");
        Ok(request_id)
    }

    /// Read the next chunk header.
    ///
    /// If the header carries the error flag, the body is consumed here
    /// and surfaced as [`ImportError::Helper`]; the channel is left at
    /// a clean message boundary.
    pub fn read_header(&mut self) -> Result<ChunkHeader> {
        let mut bytes = [0u8; HEADER_SIZE];
        self.reader
            .read_exact(&mut bytes)
            .map_err(ImportError::Truncated)?;
        let header = ChunkHeader::decode(&bytes);

        if header.is_error() {
            let mut body = Vec::new();
            self.read_body_into(&mut body, header.data_length as usize)?;
            let message = String::from_utf8_lossy(&body).into_owned();
            warn!(request_id = header.request_id, %message, "helper reported error");
            return Err(ImportError::Helper(message));
        }

        Ok(header)
    }

    /// Read exactly `len` body bytes into `buf`, reusing its capacity.
    pub fn read_body_into(&mut self, buf: &mut Vec<u8>, len: usize) -> Result<()> {
        buf.clear();
        buf.resize(len, 0);
        self.reader
            .read_exact(buf)
            .map_err(ImportError::Truncated)?;
        Ok(())
    }
}

impl<R, W> FramedChannel<R, W> {
    /// Drop the write half, signalling end-of-input to the peer.
    pub fn close_writer(&mut self) {
        self.writer = None;
    }
}
