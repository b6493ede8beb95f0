//! Fan-out of server events to audiences.
//!
//! Delivery is fire-and-forget and at-most-once: there is no ack, no retry
//! and no backpressure. A recipient whose queue is full or whose socket is
//! gone simply misses the event and reconciles through REST on reconnect.

use std::sync::Arc;

use crate::metrics::{BROADCAST_DROPS_TOTAL, BROADCAST_EVENTS_TOTAL};
use crate::models::{ServerEvent, UserRole};

use super::rooms::{Delivery, Room, RoomRouter};

#[derive(Clone)]
pub struct BroadcastDispatcher {
    rooms: Arc<RoomRouter>,
}

impl BroadcastDispatcher {
    pub fn new(rooms: Arc<RoomRouter>) -> Self {
        Self { rooms }
    }

    pub fn rooms(&self) -> &Arc<RoomRouter> {
        &self.rooms
    }

    /// Direct reply on a single socket (acks, snapshots)
    pub fn to_connection(&self, connection_id: &str, event: &ServerEvent) -> Delivery {
        let delivery = self.rooms.send_to_connection(connection_id, frame(event));
        record("connection", event, delivery)
    }

    /// Every socket of the user, through the `user:{id}` room
    pub fn to_user(&self, user_id: &str, event: &ServerEvent) -> Delivery {
        let delivery =
            self.rooms
                .send_to_rooms(&[Room::User(user_id.to_string())], None, frame(event));
        record("user", event, delivery)
    }

    pub fn to_role(&self, role: UserRole, event: &ServerEvent) -> Delivery {
        let delivery = self.rooms.send_to_rooms(&[Room::Role(role)], None, frame(event));
        record("role", event, delivery)
    }

    /// Admin and teacher role rooms
    pub fn to_supervisors(&self, event: &ServerEvent) -> Delivery {
        let delivery = self
            .rooms
            .send_to_rooms(&supervisor_rooms(), None, frame(event));
        record("supervisors", event, delivery)
    }

    /// Quiz scoping is advisory only: every supervisor receives the event
    /// whether or not they watch `quiz_id`.
    pub fn to_quiz_supervisors(&self, quiz_id: &str, event: &ServerEvent) -> Delivery {
        tracing::trace!(quiz_id, event = event.name(), "broadcast to quiz supervisors");
        self.to_supervisors(event)
    }

    /// Supervisor broadcast that skips the originating socket
    pub fn to_supervisors_except(&self, connection_id: &str, event: &ServerEvent) -> Delivery {
        let delivery =
            self.rooms
                .send_to_rooms(&supervisor_rooms(), Some(connection_id), frame(event));
        record("supervisors", event, delivery)
    }

    /// Sockets that joined `quiz:{id}`
    pub fn to_quiz_room(&self, quiz_id: &str, event: &ServerEvent) -> Delivery {
        let delivery =
            self.rooms
                .send_to_rooms(&[Room::Quiz(quiz_id.to_string())], None, frame(event));
        record("quiz", event, delivery)
    }

    /// Students plus anyone watching `quiz:{id}`, each socket at most once
    pub fn to_quiz_audience(&self, quiz_id: &str, event: &ServerEvent) -> Delivery {
        let rooms = [Room::Role(UserRole::Student), Room::Quiz(quiz_id.to_string())];
        let delivery = self.rooms.send_to_rooms(&rooms, None, frame(event));
        record("quiz_audience", event, delivery)
    }

    pub fn to_all(&self, event: &ServerEvent) -> Delivery {
        let delivery = self.rooms.send_to_all(frame(event));
        record("all", event, delivery)
    }
}

fn supervisor_rooms() -> [Room; 2] {
    UserRole::SUPERVISORS.map(Room::Role)
}

fn frame(event: &ServerEvent) -> Arc<String> {
    Arc::new(event.to_frame())
}

fn record(scope: &str, event: &ServerEvent, delivery: Delivery) -> Delivery {
    BROADCAST_EVENTS_TOTAL
        .with_label_values(&[scope, event.name()])
        .inc();
    if delivery.dropped > 0 {
        BROADCAST_DROPS_TOTAL.inc_by(delivery.dropped as u64);
        tracing::warn!(
            scope,
            event = event.name(),
            dropped = delivery.dropped,
            "Dropped outbound frames for slow or closed clients"
        );
    }
    tracing::debug!(
        scope,
        event = event.name(),
        recipients = delivery.delivered,
        "Dispatched event"
    );
    delivery
}
