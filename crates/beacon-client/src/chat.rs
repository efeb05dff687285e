//! Chat channels: the global stream and pairwise direct conversations.
//!
//! A channel owns its message list, a draft, and a realtime subscription.
//! History is fetched on open; later inserts arrive over the subscription
//! and are merged in order. Delivery is at-least-once, so ingestion
//! deduplicates by message id.

use chrono::NaiveDate;
use tracing::warn;

use beacon_shared::protocol::{ChangeEvent, Topic};
use beacon_shared::types::{Conversation, Message, WalletAddress};
use beacon_shared::ValidationError;

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::events::{self, NoticeSender};
use crate::session::Session;
use crate::subscription::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Loading,
    Ready,
}

/// One open conversation view, as seen by the signed-in wallet.
pub struct MessagingChannel {
    api: ApiClient,
    ws_url: String,
    me: WalletAddress,
    conversation: Conversation,
    state: ChannelState,
    messages: Vec<Message>,
    draft: String,
    subscription: Option<Subscription>,
    notices: Option<NoticeSender>,
}

impl MessagingChannel {
    pub fn new(api: ApiClient, session: &Session, conversation: Conversation) -> Self {
        let ws_url = api.ws_url();
        let api = api.with_token(&session.token);
        Self {
            api,
            ws_url,
            me: session.address.clone(),
            conversation,
            state: ChannelState::Idle,
            messages: Vec::new(),
            draft: String::new(),
            subscription: None,
            notices: None,
        }
    }

    pub fn with_notices(mut self, notices: NoticeSender) -> Self {
        self.notices = Some(notices);
        self
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Messages in chronological order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    /// Fetch history and attach the realtime feed. The loading state is
    /// visible to callers for the duration of the fetch.
    pub async fn open(&mut self) -> Result<()> {
        self.state = ChannelState::Loading;

        let history = match self.fetch_history().await {
            Ok(history) => history,
            Err(e) => {
                self.state = ChannelState::Idle;
                return Err(e);
            }
        };
        self.messages = history;

        match Subscription::open(&self.ws_url, Topic::Messages).await {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => {
                warn!(error = %e, "Chat opened without realtime feed");
                events::error(&self.notices, "Error connecting to live chat");
            }
        }

        self.state = ChannelState::Ready;
        Ok(())
    }

    /// Fetch the conversation history, filtered and sorted. The server
    /// already scopes the list; filtering again keeps the view correct even
    /// against a permissive server.
    async fn fetch_history(&self) -> Result<Vec<Message>> {
        let mut history = match &self.conversation {
            Conversation::Global => self.api.global_messages().await?,
            Conversation::Direct(peer) => self.api.direct_messages(peer).await?,
        };
        history.retain(|m| m.matches(&self.me, &self.conversation));
        history.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(history)
    }

    /// Drain any buffered realtime events into the message list. Returns the
    /// number of newly ingested messages.
    pub fn pump(&mut self) -> usize {
        let mut ingested = 0;
        let mut pending = Vec::new();
        if let Some(sub) = self.subscription.as_mut() {
            while let Some(event) = sub.try_next() {
                pending.push(event);
            }
        }
        for event in pending {
            if let ChangeEvent::MessageInserted(message) = event {
                if self.ingest(message) {
                    ingested += 1;
                }
            }
        }
        ingested
    }

    /// Merge one message into the ordered list. Returns false when the
    /// message belongs to another conversation or is already present.
    pub fn ingest(&mut self, message: Message) -> bool {
        if !message.matches(&self.me, &self.conversation) {
            return false;
        }
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        let key = (message.created_at, message.id);
        let at = self
            .messages
            .partition_point(|m| (m.created_at, m.id) <= key);
        self.messages.insert(at, message);
        true
    }

    /// Send the current draft. A blank draft fails locally; on network
    /// failure the draft is kept so the user can retry. On success the draft
    /// is cleared and the full history is re-fetched, so the view converges
    /// even when push events were dropped along the way.
    pub async fn send(&mut self) -> Result<Message> {
        let content = self.draft.trim().to_string();
        if content.is_empty() {
            return Err(ClientError::Validation(ValidationError::BlankContent));
        }

        let sent = self
            .api
            .send_message(
                &content,
                self.conversation.receiver(),
                self.conversation.is_global(),
            )
            .await?;

        self.draft.clear();
        self.ingest(sent.clone());

        match self.fetch_history().await {
            Ok(history) => {
                for message in history {
                    self.ingest(message);
                }
            }
            Err(e) => {
                // The message is already sent and shown; the next fetch or
                // push event catches anything this one missed.
                warn!(error = %e, "Post-send history refresh failed");
            }
        }
        Ok(sent)
    }

    /// Messages grouped by local calendar date, preserving order. Useful for
    /// rendering date separators.
    pub fn messages_by_date(&self) -> Vec<(NaiveDate, Vec<&Message>)> {
        let mut groups: Vec<(NaiveDate, Vec<&Message>)> = Vec::new();
        for message in &self.messages {
            let date = message.created_at.date_naive();
            match groups.last_mut() {
                Some((last, bucket)) if *last == date => bucket.push(message),
                _ => groups.push((date, vec![message])),
            }
        }
        groups
    }

    /// Drop the realtime feed and forget the loaded history.
    pub fn close(&mut self) {
        self.subscription = None;
        self.messages.clear();
        self.state = ChannelState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn addr(seed: u8) -> WalletAddress {
        WalletAddress::from_pubkey(&[seed; 32])
    }

    fn channel(me: u8, conversation: Conversation) -> MessagingChannel {
        let session = Session {
            address: addr(me),
            token: "t".to_string(),
        };
        MessagingChannel::new(ApiClient::new("http://127.0.0.1:1"), &session, conversation)
    }

    fn global_msg(sender: u8, at_secs: i64) -> Message {
        Message {
            id: Uuid::new_v4(),
            content: "hi".into(),
            sender_address: addr(sender),
            receiver_address: None,
            created_at: Utc.timestamp_opt(at_secs, 0).unwrap(),
            is_global: true,
        }
    }

    #[test]
    fn test_ingest_keeps_chronological_order() {
        let mut chan = channel(1, Conversation::Global);
        let a = global_msg(2, 100);
        let b = global_msg(3, 50);
        let c = global_msg(4, 75);

        assert!(chan.ingest(a.clone()));
        assert!(chan.ingest(b.clone()));
        assert!(chan.ingest(c.clone()));

        let ids: Vec<_> = chan.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![b.id, c.id, a.id]);
    }

    #[test]
    fn test_ingest_deduplicates_by_id() {
        let mut chan = channel(1, Conversation::Global);
        let msg = global_msg(2, 10);
        assert!(chan.ingest(msg.clone()));
        assert!(!chan.ingest(msg));
        assert_eq!(chan.messages().len(), 1);
    }

    #[test]
    fn test_ingest_rejects_foreign_conversation() {
        let mut chan = channel(1, Conversation::Direct(addr(2)));
        // Global message never lands in a direct view.
        assert!(!chan.ingest(global_msg(2, 10)));
        // Direct traffic between two other parties is invisible too.
        let foreign = Message {
            id: Uuid::new_v4(),
            content: "x".into(),
            sender_address: addr(3),
            receiver_address: Some(addr(4)),
            created_at: Utc::now(),
            is_global: false,
        };
        assert!(!chan.ingest(foreign));
        assert!(chan.messages().is_empty());
    }

    #[tokio::test]
    async fn test_send_rejects_blank_draft() {
        let mut chan = channel(1, Conversation::Global);
        chan.set_draft("   ");
        let result = chan.send().await;
        assert!(matches!(
            result,
            Err(ClientError::Validation(ValidationError::BlankContent))
        ));
        // The draft survives the failed attempt.
        assert_eq!(chan.draft(), "   ");
    }

    #[test]
    fn test_messages_by_date_groups_consecutively() {
        let mut chan = channel(1, Conversation::Global);
        let day = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let m1 = Message {
            created_at: day,
            ..global_msg(2, 0)
        };
        let m2 = Message {
            created_at: day + Duration::minutes(5),
            ..global_msg(3, 0)
        };
        let m3 = Message {
            created_at: day + Duration::days(1),
            ..global_msg(4, 0)
        };
        chan.ingest(m1);
        chan.ingest(m2);
        chan.ingest(m3);

        let groups = chan.messages_by_date();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].1.len(), 1);
    }
}
