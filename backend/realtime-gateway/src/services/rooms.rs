//! Connection groups used to scope event delivery.
//!
//! Every live socket is attached with its outbound queue. Rooms are created
//! on first join and dropped as soon as their last member leaves. Locks are
//! `std::sync` and are never held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;

use crate::models::UserRole;

pub type ConnectionId = String;

/// Outbound queue of a single socket; frames are pre-serialized JSON
pub type OutboundSender = mpsc::Sender<Arc<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    Role(UserRole),
    User(String),
    Quiz(String),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Role(role) => write!(f, "role:{}", role),
            Room::User(user_id) => write!(f, "user:{}", user_id),
            Room::Quiz(quiz_id) => write!(f, "quiz:{}", quiz_id),
        }
    }
}

/// Result of a fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct RouterState {
    connections: HashMap<ConnectionId, OutboundSender>,
    rooms: HashMap<Room, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<Room>>,
}

#[derive(Default)]
pub struct RoomRouter {
    state: RwLock<RouterState>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, connection_id: &str, sender: OutboundSender) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.connections.insert(connection_id.to_string(), sender);
    }

    /// Removes the connection and its memberships. Returns false if it was
    /// not attached.
    pub fn detach(&self, connection_id: &str) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let attached = state.connections.remove(connection_id).is_some();
        let rooms = state.memberships.remove(connection_id).unwrap_or_default();
        for room in rooms {
            remove_member(&mut state.rooms, &room, connection_id);
        }
        attached
    }

    /// Returns true when the connection was not already a member.
    /// Unknown connections are ignored.
    pub fn join(&self, connection_id: &str, room: Room) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.connections.contains_key(connection_id) {
            return false;
        }
        let newly_joined = state
            .memberships
            .entry(connection_id.to_string())
            .or_default()
            .insert(room.clone());
        state
            .rooms
            .entry(room)
            .or_default()
            .insert(connection_id.to_string());
        newly_joined
    }

    pub fn leave(&self, connection_id: &str, room: &Room) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let was_member = state
            .memberships
            .get_mut(connection_id)
            .map(|rooms| rooms.remove(room))
            .unwrap_or(false);
        if was_member {
            remove_member(&mut state.rooms, room, connection_id);
        }
        was_member
    }

    pub fn is_member(&self, connection_id: &str, room: &Room) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .rooms
            .get(room)
            .is_some_and(|members| members.contains(connection_id))
    }

    pub fn room_size(&self, room: &Room) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.rooms.get(room).map_or(0, HashSet::len)
    }

    pub fn room_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rooms
            .len()
    }

    pub fn connection_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connections
            .len()
    }

    pub fn send_to_connection(&self, connection_id: &str, frame: Arc<String>) -> Delivery {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut delivery = Delivery::default();
        if let Some(sender) = state.connections.get(connection_id) {
            push(sender, frame, &mut delivery);
        }
        delivery
    }

    /// Delivers once per connection across the union of `rooms`
    pub fn send_to_rooms(
        &self,
        rooms: &[Room],
        except: Option<&str>,
        frame: Arc<String>,
    ) -> Delivery {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let recipients: HashSet<&ConnectionId> = rooms
            .iter()
            .filter_map(|room| state.rooms.get(room))
            .flatten()
            .filter(|id| Some(id.as_str()) != except)
            .collect();

        let mut delivery = Delivery::default();
        for id in recipients {
            if let Some(sender) = state.connections.get(id) {
                push(sender, frame.clone(), &mut delivery);
            }
        }
        delivery
    }

    pub fn send_to_all(&self, frame: Arc<String>) -> Delivery {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut delivery = Delivery::default();
        for sender in state.connections.values() {
            push(sender, frame.clone(), &mut delivery);
        }
        delivery
    }
}

fn remove_member(rooms: &mut HashMap<Room, HashSet<ConnectionId>>, room: &Room, id: &str) {
    if let Some(members) = rooms.get_mut(room) {
        members.remove(id);
        if members.is_empty() {
            rooms.remove(room);
        }
    }
}

// Full or closed queues drop the frame: delivery is at-most-once
fn push(sender: &OutboundSender, frame: Arc<String>, delivery: &mut Delivery) {
    if sender.try_send(frame).is_ok() {
        delivery.delivered += 1;
    } else {
        delivery.dropped += 1;
    }
}
