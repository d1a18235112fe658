//! Frame reading from the manager socket

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::{
    buffer::FrameBuffer,
    constants::{FRAME_TERMINATOR, READ_CHUNK},
    error::{AmiError, AmiResult},
};

/// Read until the buffer holds a complete frame and return it.
///
/// The frame is returned without its blank-line terminator; both are removed
/// from `buffer`, residual bytes stay for the next call. `Ok(None)` means the
/// peer reached end-of-stream before a terminator showed up (any partial
/// frame stays buffered). Read failures surface as [`AmiError::FrameRead`].
pub(crate) async fn read_frame<R>(reader: &mut R, buffer: &mut FrameBuffer) -> AmiResult<Option<String>>
where
    R: AsyncRead + Unpin,
{
    read_until(reader, buffer, FRAME_TERMINATOR.as_bytes()).await
}

/// Read one `\n`-terminated line, trailing `\r` stripped.
///
/// Used for the banner the manager sends before any frame.
pub(crate) async fn read_line<R>(reader: &mut R, buffer: &mut FrameBuffer) -> AmiResult<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let line = read_until(reader, buffer, b"\n").await?;
    Ok(line.map(|l| {
        l.strip_suffix('\r')
            .map(str::to_string)
            .unwrap_or(l)
    }))
}

async fn read_until<R>(
    reader: &mut R,
    buffer: &mut FrameBuffer,
    pattern: &[u8],
) -> AmiResult<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(bytes) = buffer.extract_until_pattern(pattern) {
            buffer.compact();
            trace!("[RECV] Extracted {} bytes from buffer", bytes.len());
            return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
        }

        let bytes_read = reader
            .read(&mut chunk)
            .await
            .map_err(AmiError::FrameRead)?;
        trace!("[RECV] Read {} bytes from socket", bytes_read);

        if bytes_read == 0 {
            return Ok(None);
        }

        buffer.extend_from_slice(&chunk[..bytes_read]);
        buffer.check_size_limits()?;
    }
}
