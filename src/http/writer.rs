//! Puts a [`Response`] on the wire.

use crate::{
    errors::WriteFault,
    http::{
        response::Body,
        types::{number_to_bytes, Header, StatusCode},
    },
    Response,
};
use std::time::Duration;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    time::timeout,
};
use tracing::warn;

/// Writes `response` to `stream` and returns the number of body bytes sent.
///
/// Output order: status line, the handler's headers, `Connection: close`,
/// `Content-Length` (when the length is known), blank line, body.
/// With `head_only` the body is skipped and a stream's generator never runs.
///
/// A stream's cleanup action runs exactly once, whatever the outcome.
pub(crate) async fn write_response<W>(
    stream: &mut W,
    response: Response,
    head_only: bool,
    limit: Option<Duration>,
) -> Result<u64, WriteFault>
where
    W: AsyncWrite + Unpin,
{
    let (status, headers, body) = response.into_parts();
    let mut head = head_bytes(status, &headers, body.len());

    match body {
        Body::Buffered(bytes) => {
            if head_only {
                write_all(stream, &head, limit).await?;
                flush(stream, limit).await?;
                return Ok(0);
            }

            head.extend_from_slice(&bytes);
            write_all(stream, &head, limit).await?;
            flush(stream, limit).await?;
            Ok(bytes.len() as u64)
        }
        // Every early return drops `body`, which runs its cleanup.
        Body::Stream(mut body) => {
            write_all(stream, &head, limit).await?;
            if head_only {
                flush(stream, limit).await?;
                return Ok(0);
            }

            let declared = body.length();
            let mut sent = 0u64;

            while declared.map_or(true, |declared| sent < declared) {
                let Some(mut chunk) = body.next_chunk(sent)? else {
                    break;
                };
                if let Some(declared) = declared {
                    let room = declared - sent;
                    if chunk.len() as u64 > room {
                        warn!(
                            declared,
                            sent,
                            chunk = chunk.len(),
                            "stream exceeds Content-Length, truncated"
                        );
                        chunk.truncate(room as usize);
                    }
                }

                write_all(stream, &chunk, limit).await?;
                sent += chunk.len() as u64;
            }
            body.finish();

            if declared.is_some_and(|declared| declared > sent) {
                warn!(declared, sent, "stream ended short of Content-Length");
            }

            flush(stream, limit).await?;
            Ok(sent)
        }
    }
}

fn head_bytes(status: StatusCode, headers: &[Header], length: Option<u64>) -> Vec<u8> {
    let mut head = Vec::with_capacity(128);

    head.extend_from_slice(status.first_line());
    for header in headers {
        head.extend_from_slice(header.name.as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(header.value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(b"Connection: close\r\n");

    let length = match (status, length) {
        (StatusCode::NoContent | StatusCode::NotModified, Some(0)) => None,
        (_, length) => length,
    };
    if let Some(length) = length {
        let (digits, start) = number_to_bytes(length);
        head.extend_from_slice(b"Content-Length: ");
        head.extend_from_slice(&digits[start..]);
        head.extend_from_slice(b"\r\n");
    }

    head.extend_from_slice(b"\r\n");
    head
}

#[inline]
async fn write_all<W>(stream: &mut W, bytes: &[u8], limit: Option<Duration>) -> Result<(), WriteFault>
where
    W: AsyncWrite + Unpin,
{
    match limit {
        Some(limit) => timeout(limit, stream.write_all(bytes))
            .await
            .map_err(|_| WriteFault::TimedOut)??,
        None => stream.write_all(bytes).await?,
    }
    Ok(())
}

#[inline]
async fn flush<W>(stream: &mut W, limit: Option<Duration>) -> Result<(), WriteFault>
where
    W: AsyncWrite + Unpin,
{
    match limit {
        Some(limit) => timeout(limit, stream.flush())
            .await
            .map_err(|_| WriteFault::TimedOut)??,
        None => stream.flush().await?,
    }
    Ok(())
}
