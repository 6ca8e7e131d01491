use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::io::BufReader;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error};

use super::types::{McpMessage, McpNotification, McpRequest, McpResponse};

pub struct StdioTransport {
    reader: FramedRead<BufReader<tokio::io::Stdin>, AnyDelimiterCodec>,
    writer: FramedWrite<tokio::io::Stdout, LinesCodec>,
}

/// Classifies one JSON-RPC line. Anything unparseable comes back as
/// `Malformed` so the server can answer it instead of shutting down.
pub fn parse_message(line: &str) -> McpMessage {
    let value = match serde_json::from_str::<serde_json::Value>(line) {
        Ok(value) => value,
        Err(e) => {
            error!("Failed to parse JSON: {}", e);
            return McpMessage::Malformed(format!("Invalid JSON: {}", e));
        }
    };

    let Some(obj) = value.as_object() else {
        error!("Invalid JSON-RPC message structure");
        return McpMessage::Malformed("Invalid JSON-RPC message structure".to_string());
    };

    // Requests carry an id, notifications do not
    if obj.contains_key("id") {
        match serde_json::from_value::<McpRequest>(value) {
            Ok(request) => McpMessage::Request(request),
            Err(e) => {
                error!("Failed to parse request: {}", e);
                McpMessage::Malformed(format!("Invalid JSON-RPC request: {}", e))
            }
        }
    } else {
        match serde_json::from_value::<McpNotification>(value) {
            Ok(notification) => McpMessage::Notification(notification),
            Err(e) => {
                error!("Failed to parse notification: {}", e);
                McpMessage::Malformed(format!("Invalid JSON-RPC notification: {}", e))
            }
        }
    }
}

/// Decodes one raw input line. Blank lines yield `None`; bytes that are not
/// UTF-8 become `Malformed` rather than a transport failure.
pub fn decode_line(bytes: &[u8]) -> Option<McpMessage> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    let line = match std::str::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => {
            error!("Received non UTF-8 input: {}", e);
            return Some(McpMessage::Malformed(format!("Invalid UTF-8: {}", e)));
        }
    };
    if line.trim().is_empty() {
        return None;
    }
    Some(parse_message(line))
}

impl StdioTransport {
    pub fn new() -> Self {
        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();

        let reader = FramedRead::new(
            BufReader::new(stdin),
            AnyDelimiterCodec::new(b"\n".to_vec(), b"\n".to_vec()),
        );
        let writer = FramedWrite::new(stdout, LinesCodec::new());

        Self { reader, writer }
    }

    /// Next non-blank message, or `None` at EOF.
    pub async fn read_message(&mut self) -> Result<Option<McpMessage>> {
        loop {
            match self.reader.next().await {
                Some(Ok(line)) => {
                    if let Some(message) = decode_line(&line) {
                        debug!("Received: {} bytes", line.len());
                        return Ok(Some(message));
                    }
                }
                Some(Err(e)) => {
                    error!("Error reading from stdin: {}", e);
                    return Err(anyhow::anyhow!("Transport error: {}", e));
                }
                None => {
                    debug!("EOF reached");
                    return Ok(None);
                }
            }
        }
    }

    pub async fn write_response(&mut self, response: McpResponse) -> Result<()> {
        let json = serde_json::to_string(&response)?;
        debug!("Sending: {} bytes", json.len());

        self.writer.send(json).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_requests_and_notifications() {
        match parse_message(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#) {
            McpMessage::Request(request) => assert_eq!(request.method, "ping"),
            other => panic!("expected request, got {:?}", other),
        }
        match parse_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#) {
            McpMessage::Notification(n) => assert_eq!(n.method, "notifications/initialized"),
            other => panic!("expected notification, got {:?}", other),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(parse_message("{not json"), McpMessage::Malformed(_)));
        assert!(matches!(parse_message("[1,2]"), McpMessage::Malformed(_)));
        assert!(matches!(
            parse_message(r#"{"jsonrpc":"2.0","id":1}"#),
            McpMessage::Malformed(_)
        ));
    }

    #[test]
    fn non_utf8_line_is_malformed() {
        match decode_line(&[0xff, 0xfe, b'{']) {
            Some(McpMessage::Malformed(reason)) => assert!(reason.starts_with("Invalid UTF-8")),
            other => panic!("expected malformed message, got {:?}", other),
        }
        assert!(decode_line(b"  \r").is_none());
        assert!(matches!(
            decode_line(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\r"),
            Some(McpMessage::Request(_))
        ));
    }
}
