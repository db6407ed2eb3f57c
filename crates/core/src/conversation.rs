//! Conversation-related types.

use std::collections::HashMap;

use colloquy_model::{Message, Role};

use crate::AgentId;

/// The per-peer message histories observed by one agent.
///
/// Every peer maps to an ordered list of messages, the last element is
/// always the most recently recorded one. Roles are relative to the
/// observer: what it sent is `assistant`, what it received is `user`.
#[derive(Clone, Default, Debug)]
pub struct Conversations {
    histories: HashMap<AgentId, Vec<Message>>,
}

impl Conversations {
    /// Records a copy of `message` with the observer-relative `role`.
    /// Function-role messages keep their role.
    pub(crate) fn record(&mut self, peer: AgentId, message: &Message, role: Role) {
        let mut message = message.clone();
        if !message.is_function() {
            message.role = role;
        }
        self.histories.entry(peer).or_default().push(message);
    }

    /// Returns the history with `peer`, if they have ever conversed.
    #[inline]
    pub fn get(&self, peer: AgentId) -> Option<&[Message]> {
        self.histories.get(&peer).map(Vec::as_slice)
    }

    /// Returns the most recent message with `peer`.
    #[inline]
    pub fn last(&self, peer: AgentId) -> Option<&Message> {
        self.histories.get(&peer).and_then(|h| h.last())
    }

    /// Returns the peers this agent has conversed with.
    #[inline]
    pub fn peers(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.histories.keys().copied()
    }

    #[inline]
    pub(crate) fn clear(&mut self, peer: Option<AgentId>) {
        match peer {
            Some(peer) => {
                self.histories.remove(&peer);
            }
            None => self.histories.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_relabels_roles() {
        let peer = AgentId::next();
        let mut conversations = Conversations::default();

        let mut sent = Message::user("hello");
        conversations.record(peer, &sent, Role::Assistant);
        sent.content = Some("mutated".to_owned());
        conversations.record(peer, &Message::function("f", "42"), Role::User);

        let history = conversations.get(peer).unwrap();
        assert_eq!(history[0].role, Role::Assistant);
        assert_eq!(history[0].text(), "hello");
        assert_eq!(history[1].role, Role::Function);
        assert_eq!(conversations.last(peer).unwrap().text(), "42");
        assert!(conversations.get(AgentId::next()).is_none());
    }
}
