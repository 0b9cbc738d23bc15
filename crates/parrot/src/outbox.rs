//! Per-conversation outbox actor.
//!
//! Chat messages to one conversation must reach the server in the order
//! they were written. Each conversation gets its own Tokio task that
//! drains an unbounded channel one job at a time: a send completes
//! before the next one starts. Different conversations don't wait on each
//! other.
//!
//! ```text
//! Client::send_chat_message ──enqueue──→ [mpsc] ──→ OutboxActor::run
//!        │                                             │ build body, request
//!        └──── SendReceipt ←────────── oneshot ────────┘
//! ```
//!
//! The actor holds only a weak reference to the client; once the client
//! is gone the remaining jobs fail with `OutboxClosed`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use parrot_schema::Message;
use parrot_transport::Transport;
use tokio::sync::{mpsc, oneshot};

use crate::ClientError;
use crate::client::ClientInner;
use crate::requests::OutgoingMessage;

type Reply = Result<Message, ClientError>;

/// One queued chat message.
pub(crate) struct OutboxJob {
    pub(crate) message: OutgoingMessage,
    pub(crate) cgid: u32,
    pub(crate) reply: oneshot::Sender<Reply>,
}

/// Sending half of a conversation's outbox.
#[derive(Clone)]
pub(crate) struct OutboxHandle {
    sender: mpsc::UnboundedSender<OutboxJob>,
}

impl OutboxHandle {
    /// Spawns the actor for `conversation_id`. Must be called from within
    /// a Tokio runtime.
    pub(crate) fn spawn<T: Transport>(conversation_id: &str, client: Weak<ClientInner<T>>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = OutboxActor {
            conversation_id: conversation_id.to_string(),
            client,
            receiver,
        };
        tokio::spawn(actor.run());
        Self { sender }
    }

    /// Queues a job. Gives the job back if the actor has stopped.
    pub(crate) fn enqueue(&self, job: OutboxJob) -> Result<(), OutboxJob> {
        self.sender.send(job).map_err(|mpsc::error::SendError(job)| job)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

struct OutboxActor<T: Transport> {
    conversation_id: String,
    client: Weak<ClientInner<T>>,
    receiver: mpsc::UnboundedReceiver<OutboxJob>,
}

impl<T: Transport> OutboxActor<T> {
    async fn run(mut self) {
        tracing::debug!(conversation_id = %self.conversation_id, "outbox started");

        while let Some(job) = self.receiver.recv().await {
            let Some(client) = self.client.upgrade() else {
                let _ = job
                    .reply
                    .send(Err(ClientError::OutboxClosed(self.conversation_id.clone())));
                continue;
            };

            let request = client
                .builder()
                .await
                .send_chat_message(&self.conversation_id, &job.message, job.cgid);
            let result = client.send(&request).await;
            if let Err(e) = &result {
                tracing::warn!(
                    conversation_id = %self.conversation_id,
                    error = %e,
                    "chat message not sent"
                );
            }
            // The caller may have dropped its receipt.
            let _ = job.reply.send(result);
        }

        tracing::debug!(conversation_id = %self.conversation_id, "outbox stopped");
    }
}

/// Resolves once a queued chat message has been sent and its reply
/// decoded.
///
/// Dropping the receipt doesn't cancel the send.
#[must_use = "the send happens regardless, but its result is only reported here"]
pub struct SendReceipt {
    conversation_id: String,
    reply: oneshot::Receiver<Reply>,
}

impl SendReceipt {
    pub(crate) fn new(conversation_id: &str, reply: oneshot::Receiver<Reply>) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            reply,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl Future for SendReceipt {
    type Output = Result<Message, ClientError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.reply).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => {
                Poll::Ready(Err(ClientError::OutboxClosed(this.conversation_id.clone())))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
