//! tokio-tungstenite adapters for the hub's connection traits.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use murmur_hub::{ConnectionError, ConnectionReader, ConnectionWriter, Inbound};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::error::{CapacityError, Error as WsError, ProtocolError};
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

/// Read half of a WebSocket, as seen by a peer's reader pump.
pub struct WsReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

/// Write half of a WebSocket, as seen by a peer's writer pump.
pub struct WsWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

impl<S> std::fmt::Debug for WsReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsReader").finish_non_exhaustive()
    }
}

impl<S> std::fmt::Debug for WsWriter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsWriter").finish_non_exhaustive()
    }
}

impl<S> WsReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Split `ws` into a reader and a writer.
    pub fn split(ws: WebSocketStream<S>) -> (WsReader<S>, WsWriter<S>) {
        let (sink, stream) = ws.split();
        (WsReader { stream }, WsWriter { sink })
    }
}

#[async_trait]
impl<S> ConnectionReader for WsReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Inbound, ConnectionError> {
        loop {
            let Some(next) = self.stream.next().await else {
                return Err(ConnectionError::Reset);
            };
            match next.map_err(map_ws_error)? {
                msg @ (Message::Text(_) | Message::Binary(_)) => {
                    return Ok(Inbound::Message(msg.into_data()));
                }
                Message::Ping(_) => return Ok(Inbound::Ping),
                Message::Pong(_) => return Ok(Inbound::Pong),
                Message::Close(frame) => {
                    return Err(ConnectionError::Closed {
                        code: frame.map(|f| u16::from(f.code)),
                    });
                }
                // Raw frames never surface while reading.
                Message::Frame(_) => continue,
            }
        }
    }
}

#[async_trait]
impl<S> ConnectionWriter for WsWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: Bytes) -> Result<(), ConnectionError> {
        // Text when it is text; peers may relay arbitrary bytes.
        let message = match Utf8Bytes::try_from(data.clone()) {
            Ok(text) => Message::Text(text),
            Err(_) => Message::Binary(data),
        };
        self.sink.send(message).await.map_err(map_ws_error)
    }

    async fn send_ping(&mut self) -> Result<(), ConnectionError> {
        self.sink
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(map_ws_error)
    }

    async fn send_close(&mut self) -> Result<(), ConnectionError> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(map_ws_error)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.sink.close().await.map_err(map_ws_error)
    }
}

fn map_ws_error(err: WsError) -> ConnectionError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ConnectionError::Reset,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => ConnectionError::Reset,
        WsError::Capacity(CapacityError::MessageTooLong { size, max_size }) => {
            ConnectionError::MessageTooLarge {
                size,
                max: max_size,
            }
        }
        WsError::Io(e) => ConnectionError::Io(e),
        other => ConnectionError::Protocol(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};

    async fn pair() -> (
        WsReader<DuplexStream>,
        WsWriter<DuplexStream>,
        WebSocketStream<DuplexStream>,
    ) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let (reader, writer) = WsReader::split(server);
        (reader, writer, client)
    }

    #[tokio::test]
    async fn text_and_binary_become_messages() {
        let (mut reader, _writer, mut client) = pair().await;

        client.send(Message::text("hello")).await.unwrap();
        client
            .send(Message::Binary(Bytes::from_static(&[0xff, 0x00])))
            .await
            .unwrap();

        let Inbound::Message(text) = reader.recv().await.unwrap() else {
            panic!("expected message");
        };
        assert_eq!(text, "hello");
        let Inbound::Message(binary) = reader.recv().await.unwrap() else {
            panic!("expected message");
        };
        assert_eq!(&binary[..], &[0xff, 0x00]);
    }

    #[tokio::test]
    async fn pong_is_reported() {
        let (mut reader, _writer, mut client) = pair().await;

        client.send(Message::Pong(Bytes::new())).await.unwrap();
        assert!(matches!(reader.recv().await.unwrap(), Inbound::Pong));
    }

    #[tokio::test]
    async fn close_frame_carries_code() {
        let (mut reader, _writer, mut client) = pair().await;

        client
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "bye".into(),
            })))
            .await
            .unwrap();

        let err = reader.recv().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Closed { code: Some(1001) }));
        assert!(!err.is_unexpected_close());
    }

    #[tokio::test]
    async fn dropped_peer_reads_as_reset_or_io() {
        let (mut reader, _writer, client) = pair().await;
        drop(client);

        let err = reader.recv().await.unwrap_err();
        assert!(
            matches!(err, ConnectionError::Reset | ConnectionError::Io(_)),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn writer_sends_text_ping_and_close() {
        let (_reader, mut writer, mut client) = pair().await;

        writer.send(Bytes::from_static(b"a\nb")).await.unwrap();
        writer.send(Bytes::from_static(&[0xc3])).await.unwrap();
        writer.send_ping().await.unwrap();
        writer.send_close().await.unwrap();

        assert_eq!(client.next().await.unwrap().unwrap(), Message::text("a\nb"));
        assert_eq!(
            client.next().await.unwrap().unwrap(),
            Message::Binary(Bytes::from_static(&[0xc3]))
        );
        assert!(matches!(client.next().await.unwrap().unwrap(), Message::Ping(_)));
        assert!(matches!(client.next().await.unwrap().unwrap(), Message::Close(None)));
    }

    #[tokio::test]
    async fn coalesced_utf8_frame_goes_out_as_text() {
        let (_reader, mut writer, mut client) = pair().await;

        let frame = Bytes::from("alice :\thé\nbob :\t日本");
        writer.send(frame.clone()).await.unwrap();

        let Message::Text(text) = client.next().await.unwrap().unwrap() else {
            panic!("expected a text frame");
        };
        assert_eq!(text.as_bytes(), &frame[..]);
    }

    #[test]
    fn capacity_error_maps_to_message_too_large() {
        let err = map_ws_error(WsError::Capacity(CapacityError::MessageTooLong {
            size: 2048,
            max_size: 1024,
        }));
        assert!(matches!(
            err,
            ConnectionError::MessageTooLarge {
                size: 2048,
                max: 1024
            }
        ));
    }

    #[test]
    fn closed_errors_map_to_reset() {
        assert!(matches!(
            map_ws_error(WsError::ConnectionClosed),
            ConnectionError::Reset
        ));
        assert!(matches!(
            map_ws_error(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)),
            ConnectionError::Reset
        ));
    }
}
