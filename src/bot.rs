//! Main bot loop — receives messages, runs the lookup, sends one reply.

use futures::StreamExt;

use crate::channels::{ChannelManager, IncomingMessage, OutgoingResponse, StatusUpdate};
use crate::error::Error;
use crate::lookup::{self, EmailFinder};

/// Ties the channels to the email finder.
pub struct Bot {
    finder: EmailFinder,
    channels: ChannelManager,
}

impl Bot {
    pub fn new(finder: EmailFinder, channels: ChannelManager) -> Self {
        Self { finder, channels }
    }

    /// Run until Ctrl+C or until every channel stream ends.
    pub async fn run(self) -> Result<(), Error> {
        self.channels.health_check_all().await?;
        let mut message_stream = self.channels.start_all().await?;

        tracing::info!(channels = ?self.channels.names(), "Started");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            let reply = self.handle_message(&message).await;
            if let Err(e) = self
                .channels
                .respond(&message, OutgoingResponse::text(reply))
                .await
            {
                tracing::error!(channel = %message.channel, "Failed to send reply: {}", e);
            }
        }

        self.channels.shutdown_all().await;
        Ok(())
    }

    /// Produce the reply text for one message. Never fails: lookup errors
    /// are logged and turned into the fallback reply.
    pub async fn handle_message(&self, message: &IncomingMessage) -> String {
        tracing::info!(
            channel = %message.channel,
            user = %message.user_id,
            "Got a message: {}",
            message.content
        );

        if let Err(e) = self
            .channels
            .send_status(message, StatusUpdate::Thinking("Looking up email".into()))
            .await
        {
            tracing::debug!("Status update failed: {}", e);
        }

        let result = self.finder.find_email(&message.content).await;
        if let Err(ref e) = result {
            tracing::error!(input = %message.content, "Lookup failed: {}", e);
        }

        let reply = lookup::reply_for(&result).to_string();
        tracing::info!("Response: {}", reply);
        reply
    }
}
