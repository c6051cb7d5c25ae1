//! Typed client for the text protocol.
//!
//! Sends one command line and reads the length-prefixed response. Error codes
//! from the server surface as [`ClientError::Server`].

use crate::error::{BrokerError, BrokerResult, ClientError};
use crate::protocol::{RESPONSE_CLOSE_WAIT, RESPONSE_OK};
use bytes::Bytes;
use codec::{Frame, DEFAULT_MAX_FIELD_LEN, FRAME_MIN_LEN};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use types::MessageId;

#[derive(Debug)]
pub struct BrokerClient<S> {
    stream: S,
    max_response_len: usize,
}

impl BrokerClient<TcpStream> {
    pub async fn connect(addr: SocketAddr) -> BrokerResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S> BrokerClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            max_response_len: DEFAULT_MAX_FIELD_LEN,
        }
    }

    /// Cap on accepted response size
    pub fn with_max_response_len(mut self, max_response_len: usize) -> Self {
        self.max_response_len = max_response_len;
        self
    }

    /// Send a raw command line and return the raw response payload
    pub async fn command(&mut self, line: impl AsRef<[u8]>) -> BrokerResult<Bytes> {
        let line = line.as_ref();
        let mut request = Vec::with_capacity(line.len() + 1);
        request.extend_from_slice(line);
        request.push(b'\n');
        self.stream.write_all(&request).await?;
        self.stream.flush().await?;

        Ok(codec::read_response(&mut self.stream, self.max_response_len).await?)
    }

    /// Publish a body; any bytes other than a newline are carried verbatim
    pub async fn publish(&mut self, topic: &str, body: impl AsRef<[u8]>) -> BrokerResult<()> {
        let body = body.as_ref();
        let mut line = Vec::with_capacity(topic.len() + body.len() + 5);
        line.extend_from_slice(b"PUB ");
        line.extend_from_slice(topic.as_bytes());
        line.push(b' ');
        line.extend_from_slice(body);
        let response = self.command(line).await?;
        expect(&response, RESPONSE_OK)
    }

    pub async fn subscribe(&mut self, topic: &str, channel: Option<&str>) -> BrokerResult<()> {
        let line = match channel {
            Some(channel) => format!("SUB {topic} {channel}"),
            None => format!("SUB {topic}"),
        };
        let response = self.command(&line).await?;
        expect(&response, RESPONSE_OK)
    }

    /// Wait for the next delivery on the subscribed channel
    pub async fn pull(&mut self) -> BrokerResult<Frame> {
        let response = self.command("PULL").await?;
        // Error codes are always shorter than the smallest frame
        if response.len() < FRAME_MIN_LEN {
            return Err(server_error(&response));
        }
        Ok(codec::decode(&response)?)
    }

    pub async fn finish(&mut self, id: MessageId) -> BrokerResult<()> {
        let response = self.command(&format!("FIN {id}")).await?;
        expect(&response, RESPONSE_OK)
    }

    pub async fn requeue(&mut self, id: MessageId) -> BrokerResult<()> {
        let response = self.command(&format!("REQ {id}")).await?;
        expect(&response, RESPONSE_OK)
    }

    /// Send `CLS` and hand back the underlying stream
    pub async fn close(mut self) -> BrokerResult<S> {
        let response = self.command("CLS").await?;
        expect(&response, RESPONSE_CLOSE_WAIT)?;
        Ok(self.stream)
    }
}

fn expect(response: &[u8], wanted: &[u8]) -> BrokerResult<()> {
    if response == wanted {
        Ok(())
    } else {
        Err(server_error(response))
    }
}

fn server_error(response: &[u8]) -> BrokerError {
    let text = String::from_utf8_lossy(response).into_owned();
    if text.starts_with("E_") {
        BrokerError::Client(ClientError::Server(text))
    } else {
        BrokerError::UnexpectedResponse(text)
    }
}
