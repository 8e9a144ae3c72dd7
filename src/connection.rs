// ABOUTME: Buffered frame I/O over the two halves of an SMPP TCP connection
// ABOUTME: The reader splits length-delimited PDUs off the stream, the writer batches encoded PDUs

use crate::client::{SmppError, SmppResult};
use crate::codec::{CodecError, RawPdu};
use bytes::{Buf, Bytes, BytesMut};
use std::io::{self, Cursor};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// Read side of an SMPP connection.
///
/// The session reads and writes from different tasks, so the socket is split
/// and each half gets its own wrapper. Decoding of PDU bodies is left to the
/// caller; this only guarantees whole frames.
#[derive(Debug)]
pub struct FrameReader<R> {
    stream: R,

    // The buffer for reading frames.
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R) -> FrameReader<R> {
        FrameReader {
            stream,
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read a single PDU from the stream.
    ///
    /// Returns `None` when the peer closed the connection on a frame boundary.
    /// A close in the middle of a frame is reported as a reset.
    pub async fn read_pdu(&mut self) -> SmppResult<Option<RawPdu>> {
        loop {
            if let Some(pdu) = self.parse_pdu()? {
                return Ok(Some(pdu));
            }

            // `0` indicates "end of stream".
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(SmppError::Connection(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
        }
    }

    fn parse_pdu(&mut self) -> SmppResult<Option<RawPdu>> {
        let mut buf = Cursor::new(&self.buffer[..]);

        match RawPdu::check(&mut buf) {
            Ok(len) => {
                buf.set_position(0);
                let pdu = RawPdu::parse(&mut buf)?;

                // Discard the parsed data from the read buffer.
                self.buffer.advance(len);
                Ok(Some(pdu))
            }
            // Not an error, wait for more bytes
            Err(CodecError::Incomplete) => Ok(None),
            // A bad length poisons the stream; the connection has to go.
            Err(e) => Err(e.into()),
        }
    }
}

/// Write side of an SMPP connection.
#[derive(Debug)]
pub struct FrameWriter<W: AsyncWrite + Unpin> {
    stream: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(stream: W) -> FrameWriter<W> {
        FrameWriter {
            stream: BufWriter::new(stream),
        }
    }

    /// Buffer one encoded PDU. Nothing reaches the socket until `flush`.
    pub async fn write_pdu(&mut self, pdu: &Bytes) -> io::Result<()> {
        self.stream.write_all(pdu).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().await
    }

    /// Flush anything still buffered and close the write half.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.flush().await?;
        self.stream.shutdown().await
    }
}
