//! WebSocket message processing loop.
//!
//! Reads raw frames from the notification channel and feeds parsed
//! text messages to an [`Execution`] until it reports completion.

use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::execution::{Execution, ExecutionError};
use crate::messages::parse_message;

/// Read notifications until `execution` observes its completion signal.
///
/// Binary frames (latent previews) are skipped without decoding, as are
/// text frames that do not parse as a known message kind. A receive
/// error, a close frame, or the end of the stream is a
/// [`ExecutionError::Channel`]. There is no deadline here; callers that
/// need one wrap this future.
pub async fn await_completion<S>(
    ws_stream: &mut S,
    execution: &mut Execution,
) -> Result<(), ExecutionError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = ws_stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match parse_message(&text) {
                Ok(msg) => {
                    if execution.observe(&msg) {
                        tracing::info!(
                            prompt_id = %execution.prompt_id(),
                            "Execution completed (all nodes done)",
                        );
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::trace!(error = %e, raw_message = %text, "Skipping unrecognised message");
                }
            },
            Ok(Message::Binary(data)) => {
                tracing::trace!(bytes = data.len(), "Ignoring binary message (preview image)");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled automatically by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                return Err(ExecutionError::Channel(format!(
                    "ComfyUI closed the WebSocket before prompt {} completed: {frame:?}",
                    execution.prompt_id()
                )));
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                return Err(ExecutionError::Channel(format!("WebSocket receive error: {e}")));
            }
        }
    }

    Err(ExecutionError::Channel(format!(
        "WebSocket stream ended before prompt {} completed",
        execution.prompt_id()
    )))
}
