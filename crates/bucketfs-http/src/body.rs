//! S3 response body types supporting buffered, streaming, and empty modes.
//!
//! - **Buffered**: XML payloads, error bodies, and other small responses.
//! - **Streaming**: object content read from disk as it is sent.
//! - **Empty**: 204 No Content, HEAD responses, and PUT confirmations.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use http_body_util::Full;

/// S3 response body.
///
/// Implements [`http_body::Body`] so it can be used directly with hyper responses.
#[derive(Default)]
pub enum S3ResponseBody {
    /// Buffered body for small responses.
    Buffered(Full<Bytes>),
    /// Object content pulled from a stream of byte spans.
    Streaming {
        /// The content source.
        stream: BoxStream<'static, io::Result<Bytes>>,
        /// The total length, when known ahead of time.
        length: Option<u64>,
    },
    /// Empty body.
    #[default]
    Empty,
}

impl fmt::Debug for S3ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(full) => f.debug_tuple("Buffered").field(full).finish(),
            Self::Streaming { length, .. } => f
                .debug_struct("Streaming")
                .field("length", length)
                .finish_non_exhaustive(),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

impl S3ResponseBody {
    /// Create a buffered body from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// Create an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Create a buffered body from a UTF-8 string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::Buffered(Full::new(Bytes::from(s.into())))
    }

    /// Create a buffered body from an XML byte vector.
    #[must_use]
    pub fn from_xml(xml: Vec<u8>) -> Self {
        Self::Buffered(Full::new(Bytes::from(xml)))
    }

    /// Create a streaming body of `length` bytes, if known.
    pub fn from_stream<S>(stream: S, length: Option<u64>) -> Self
    where
        S: futures::Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::Streaming {
            stream: stream.boxed(),
            length,
        }
    }
}

impl http_body::Body for S3ResponseBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Streaming { stream, length } => match stream.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(data))) => {
                    if let Some(remaining) = length {
                        *remaining = remaining.saturating_sub(data.len() as u64);
                    }
                    Poll::Ready(Some(Ok(http_body::Frame::data(data))))
                }
                Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streaming { length, .. } => *length == Some(0),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Streaming {
                length: Some(length),
                ..
            } => http_body::SizeHint::with_exact(*length),
            Self::Streaming { length: None, .. } => http_body::SizeHint::default(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}
