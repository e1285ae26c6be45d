use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use uuid::Uuid;

use quad_db::Database;
use quad_db::messages::MessageKind;
use quad_db::models::MemberRow;
use quad_types::api::{Claims, Role};
use quad_types::events::GatewayEvent;
use quad_types::models::{GroupMessage, PrivateMessage, Profile};

use crate::dispatcher::Dispatcher;

/// Why a live send was dropped. Sends are fire-and-forget: the sender
/// gets no rejection event, the drop is only visible in logs.
#[derive(Debug)]
enum SendDrop {
    Unauthenticated,
    Inactive,
    NotFound,
    Blocked,
    EmptyContent,
    Internal,
}

/// The sole authority for message creation and fan-out. Validates an
/// inbound send against the member directory and block relationships,
/// applies the word filter, persists, then fans out through the
/// dispatcher.
#[derive(Clone)]
pub struct DeliveryEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    jwt_secret: String,
    /// Serializes store append + fan-out enqueue, so delivery order
    /// within a room always matches store append order.
    sequencer: Mutex<()>,
}

impl DeliveryEngine {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher, jwt_secret: String) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                db,
                dispatcher,
                jwt_secret,
                sequencer: Mutex::new(()),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Bind a connection to the member identity in the token and
    /// confirm with a Ready event. Silent on failure.
    pub async fn identify(&self, conn_id: Uuid, token: &str) {
        match self.member_for_token(token).await {
            Ok(member) => {
                let member_id = parse_member_id(&member);
                self.inner.dispatcher.bind_member(conn_id, member_id);
                self.inner
                    .dispatcher
                    .send_to_conn(conn_id, GatewayEvent::Ready { member_id });
            }
            Err(drop) => debug!("identify on {} rejected: {:?}", conn_id, drop),
        }
    }

    /// Post a message to a faculty room: validate, filter, persist,
    /// fan out to joined connections. Connections of members who have
    /// blocked the sender are excluded from delivery.
    pub async fn send_group(&self, token: &str, faculty: &str, content: &str) {
        if let Err(drop) = self.send_group_inner(token, faculty, content).await {
            debug!("group send to '{}' dropped: {:?}", faculty, drop);
        }
    }

    async fn send_group_inner(
        &self,
        token: &str,
        faculty: &str,
        content: &str,
    ) -> Result<(), SendDrop> {
        if content.trim().is_empty() {
            return Err(SendDrop::EmptyContent);
        }
        let sender = self.member_for_token(token).await?;

        let filtered = self.apply_filter(content).await?;
        let message_id = Uuid::new_v4();
        let now = Utc::now();

        // Append and enqueue under the sequencer so two concurrent
        // sends to the same room cannot deliver out of store order.
        let _guard = self.inner.sequencer.lock().await;

        let db = self.inner.db.clone();
        let mid = message_id.to_string();
        let sender_id = sender.id.clone();
        let room = faculty.to_string();
        let text = filtered.clone();
        let created_at = quad_db::timestamp(now);
        let blockers = tokio::task::spawn_blocking(move || {
            db.insert_message(
                &mid,
                &sender_id,
                Some(&room),
                None,
                &text,
                MessageKind::Group,
                &created_at,
            )?;
            db.blockers_of(&sender_id)
        })
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

        let excluded: HashSet<Uuid> = blockers.iter().filter_map(|id| id.parse().ok()).collect();

        let event = GatewayEvent::GroupMessage {
            message: GroupMessage {
                id: message_id,
                faculty: faculty.to_string(),
                sender: profile_of(&sender),
                content: filtered,
                created_at: now,
            },
        };
        self.inner.dispatcher.send_to_room(faculty, event, &excluded);
        Ok(())
    }

    /// Send a one-to-one message. Dropped without a trace for the
    /// sender if the receiver does not exist or has blocked them; if
    /// the receiver has no live connection the message is persisted
    /// and picked up on their next history fetch.
    pub async fn send_private(&self, token: &str, receiver_id: Uuid, content: &str) {
        if let Err(drop) = self.send_private_inner(token, receiver_id, content).await {
            debug!("private send to {} dropped: {:?}", receiver_id, drop);
        }
    }

    async fn send_private_inner(
        &self,
        token: &str,
        receiver_id: Uuid,
        content: &str,
    ) -> Result<(), SendDrop> {
        if content.trim().is_empty() {
            return Err(SendDrop::EmptyContent);
        }
        let sender = self.member_for_token(token).await?;

        let db = self.inner.db.clone();
        let rid = receiver_id.to_string();
        let sid = sender.id.clone();
        let receiver = tokio::task::spawn_blocking(move || {
            let receiver = db.get_member_by_id(&rid)?;
            match receiver {
                Some(receiver) => {
                    let blocked = db.is_blocked(&receiver.id, &sid)?;
                    Ok(Some((receiver, blocked)))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

        let receiver = match receiver {
            Some((_, true)) => return Err(SendDrop::Blocked),
            Some((receiver, false)) => receiver,
            None => return Err(SendDrop::NotFound),
        };

        let filtered = self.apply_filter(content).await?;
        let message_id = Uuid::new_v4();
        let now = Utc::now();

        let _guard = self.inner.sequencer.lock().await;

        let db = self.inner.db.clone();
        let mid = message_id.to_string();
        let sender_id = sender.id.clone();
        let rid = receiver.id.clone();
        let text = filtered.clone();
        let created_at = quad_db::timestamp(now);
        tokio::task::spawn_blocking(move || {
            db.insert_message(
                &mid,
                &sender_id,
                None,
                Some(&rid),
                &text,
                MessageKind::Private,
                &created_at,
            )
        })
        .await
        .map_err(join_error)?
        .map_err(db_error)?;

        let event = GatewayEvent::PrivateMessage {
            message: PrivateMessage {
                id: message_id,
                sender: profile_of(&sender),
                receiver: profile_of(&receiver),
                content: filtered,
                created_at: now,
            },
        };

        let sender_uuid = parse_member_id(&sender);
        self.inner.dispatcher.send_to_member(sender_uuid, event.clone());
        if receiver_id != sender_uuid {
            self.inner.dispatcher.send_to_member(receiver_id, event);
        }
        Ok(())
    }

    /// Resolve a bearer token to an active member. Moderator tokens
    /// are not valid on the send path.
    async fn member_for_token(&self, token: &str) -> Result<MemberRow, SendDrop> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.inner.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| SendDrop::Unauthenticated)?
        .claims;

        if claims.role != Role::Member {
            return Err(SendDrop::Unauthenticated);
        }

        let db = self.inner.db.clone();
        let id = claims.sub.to_string();
        let member = tokio::task::spawn_blocking(move || db.get_member_by_id(&id))
            .await
            .map_err(join_error)?
            .map_err(db_error)?
            .ok_or(SendDrop::Unauthenticated)?;

        if !member.is_active {
            return Err(SendDrop::Inactive);
        }
        Ok(member)
    }

    async fn apply_filter(&self, content: &str) -> Result<String, SendDrop> {
        let db = self.inner.db.clone();
        let settings = tokio::task::spawn_blocking(move || db.get_settings())
            .await
            .map_err(join_error)?
            .map_err(db_error)?;
        Ok(quad_moderation::filter(content, &settings.filter_words))
    }
}

fn join_error(e: tokio::task::JoinError) -> SendDrop {
    error!("spawn_blocking join error: {}", e);
    SendDrop::Internal
}

fn db_error(e: anyhow::Error) -> SendDrop {
    error!("delivery engine db error: {}", e);
    SendDrop::Internal
}

fn parse_member_id(member: &MemberRow) -> Uuid {
    member.id.parse().unwrap_or_else(|e| {
        warn!("Corrupt member id '{}': {}", member.id, e);
        Uuid::default()
    })
}

/// Snapshot a member's public display fields for delivery.
pub fn profile_of(member: &MemberRow) -> Profile {
    Profile {
        id: parse_member_id(member),
        full_name: member.full_name.clone(),
        faculty: member.faculty.clone(),
        degree: member.degree.clone(),
        course: member.course.clone(),
        avatar: member.avatar.clone(),
    }
}
