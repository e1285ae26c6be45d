use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{GroupMessage, PrivateMessage, Settings};

/// Events pushed from server to client over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is bound to a member identity
    Ready { member_id: Uuid },

    /// A group message was posted to a faculty room this connection joined
    GroupMessage { message: GroupMessage },

    /// A private message involving this connection's member
    PrivateMessage { message: PrivateMessage },

    /// Moderation settings changed; pushed to every live connection
    SettingsChanged { settings: Settings },
}

/// Commands sent FROM client TO server over the WebSocket.
///
/// Send commands carry the bearer token themselves: sends are
/// fire-and-forget and validation failures are dropped server-side
/// without a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Bind this connection to a member identity (enables targeted
    /// private delivery and block suppression for this connection)
    Identify { token: String },

    /// Subscribe to a faculty room
    JoinRoom { faculty: String },

    /// Post a message to a faculty room
    SendGroupMessage {
        token: String,
        faculty: String,
        content: String,
    },

    /// Send a one-to-one message
    SendPrivateMessage {
        token: String,
        receiver_id: Uuid,
        content: String,
    },
}
