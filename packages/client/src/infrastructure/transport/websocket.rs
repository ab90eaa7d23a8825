//! WebSocket を使った Transport 実装
//!
//! ## 責務
//!
//! - `Authorization: Bearer <credential>` ヘッダ付きでハンドシェイクを行う
//! - ソケットを読み取りタスクと書き込みタスクに分割し、`Channel` の mpsc に橋渡しする
//!
//! ## 設計ノート
//!
//! 再試行・タイムアウト・状態管理は `ConnectionManager` の責務です。
//! この実装は 1 回のハンドシェイクと 1 本のチャンネルだけを扱います。

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{HeaderValue, StatusCode, header::AUTHORIZATION},
        protocol::Message,
    },
};

use crate::domain::{Channel, ChannelEvent, Credential, Transport, TransportError};

/// WebSocket を使った Transport 実装
pub struct WebSocketTransport {
    /// 接続先 URL（例: `ws://127.0.0.1:8080/ws`）
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// ハンドシェイク時のエラーを TransportError に変換
///
/// 401 / 403 は資格情報の拒否として扱い、再試行の対象外にする。
fn classify_handshake_error(error: tungstenite::Error) -> TransportError {
    match error {
        tungstenite::Error::Http(response)
            if matches!(
                response.status(),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
            ) =>
        {
            TransportError::Rejected(response.status().to_string())
        }
        other => TransportError::Handshake(other.to_string()),
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, credential: &Credential) -> Result<Channel, TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credential.as_str()))
            .map_err(|e| TransportError::Handshake(format!("credential not sendable: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws_stream, _response) = connect_async(request)
            .await
            .map_err(classify_handshake_error)?;
        tracing::debug!("WebSocket handshake with {} completed", self.url);

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ChannelEvent>();

        // 書き込みタスク: sender が drop されたらソケットを閉じる
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    tracing::warn!("Failed to write frame: {}", e);
                    break;
                }
            }
            if let Err(e) = write.close().await {
                tracing::debug!("Closing WebSocket sink failed: {}", e);
            }
        });

        // 読み取りタスク: テキストフレームと切断を配送順のまま転送する
        tokio::spawn(async move {
            let reason = loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(ChannelEvent::Frame(text.as_str().to_string())).is_err() {
                            // 受信側が破棄済み（切断済み）
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break Some(
                            frame
                                .map(|f| f.reason.as_str().to_string())
                                .unwrap_or_else(|| "server closed the connection".to_string()),
                        );
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!("Ignoring binary frame ({} bytes)", data.len());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            };
            let _ = inbound_tx.send(ChannelEvent::Closed(reason));
        });

        Ok(Channel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
