//! Bounded per-session conversation memory.
//!
//! Sessions are created on first append and live for the lifetime of the
//! process. Each keeps at most `max_turns` turns; older turns are evicted
//! first. The map lock is only taken to find or create a session, and each
//! session carries its own mutex, so appends to different sessions never
//! contend while appends to one session are serialized.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use context_agent_core::models::{Role, Turn, TurnView};

type SessionHandle = Arc<Mutex<VecDeque<Turn>>>;

pub struct SessionMemory {
    max_turns: usize,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    fn get_or_create(&self, session_id: &str) -> SessionHandle {
        if let Some(handle) = self.get(session_id) {
            return handle;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(session_id.to_string()).or_default())
    }

    fn push(&self, turns: &mut VecDeque<Turn>, role: Role, content: &str) {
        turns.push_back(Turn {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    /// Append one turn, creating the session if needed.
    pub fn append(&self, session_id: &str, role: Role, content: &str) {
        let handle = self.get_or_create(session_id);
        let mut turns = handle.lock().unwrap_or_else(PoisonError::into_inner);
        self.push(&mut turns, role, content);
    }

    /// Append a user turn and the assistant's reply as one step, so no other
    /// append to the same session can land between them.
    pub fn append_exchange(&self, session_id: &str, user: &str, assistant: &str) {
        let handle = self.get_or_create(session_id);
        let mut turns = handle.lock().unwrap_or_else(PoisonError::into_inner);
        self.push(&mut turns, Role::User, user);
        self.push(&mut turns, Role::Assistant, assistant);
    }

    /// Up to `count` most recent turns, oldest first. Unknown sessions yield
    /// an empty list.
    pub fn recent(&self, session_id: &str, count: usize) -> Vec<TurnView> {
        let Some(handle) = self.get(session_id) else {
            return Vec::new();
        };
        let turns = handle.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = turns.len().saturating_sub(count);
        turns.iter().skip(skip).map(TurnView::from).collect()
    }

    /// Full copy of a session's turns, or `None` if it does not exist.
    pub fn session(&self, session_id: &str) -> Option<Vec<Turn>> {
        let handle = self.get(session_id)?;
        let turns = handle.lock().unwrap_or_else(PoisonError::into_inner);
        Some(turns.iter().cloned().collect())
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(views: &[TurnView]) -> Vec<&str> {
        views.iter().map(|t| t.content.as_str()).collect()
    }

    #[test]
    fn test_unknown_session_is_empty() {
        let memory = SessionMemory::new(20);
        assert!(memory.recent("nobody", 4).is_empty());
        assert!(memory.session("nobody").is_none());
        assert_eq!(memory.session_count(), 0);
    }

    #[test]
    fn test_recent_returns_newest_oldest_first() {
        let memory = SessionMemory::new(20);
        for i in 0..6 {
            memory.append("s", Role::User, &format!("m{}", i));
        }
        let recent = memory.recent("s", 3);
        assert_eq!(contents(&recent), vec!["m3", "m4", "m5"]);
        assert_eq!(memory.recent("s", 100).len(), 6);
        assert!(memory.recent("s", 0).is_empty());
    }

    #[test]
    fn test_bounded_to_max_turns() {
        let memory = SessionMemory::new(20);
        for i in 0..25 {
            memory.append("s", Role::User, &format!("m{}", i));
        }
        let turns = memory.session("s").unwrap();
        assert_eq!(turns.len(), 20);
        assert_eq!(turns.first().unwrap().content, "m5");
        assert_eq!(turns.last().unwrap().content, "m24");
    }

    #[test]
    fn test_append_exchange_keeps_order() {
        let memory = SessionMemory::new(3);
        memory.append_exchange("s", "q1", "a1");
        memory.append_exchange("s", "q2", "a2");

        let recent = memory.recent("s", 10);
        assert_eq!(contents(&recent), vec!["a1", "q2", "a2"]);
        assert_eq!(recent[1].role, Role::User);
        assert_eq!(recent[2].role, Role::Assistant);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let memory = SessionMemory::new(20);
        memory.append("a", Role::User, "hello");
        memory.append("b", Role::User, "bonjour");
        assert_eq!(memory.session_count(), 2);
        assert_eq!(contents(&memory.recent("a", 4)), vec!["hello"]);
        assert_eq!(contents(&memory.recent("b", 4)), vec!["bonjour"]);
    }

    #[test]
    fn test_concurrent_exchanges_stay_paired() {
        let memory = Arc::new(SessionMemory::new(1000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let memory = Arc::clone(&memory);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let user = format!("q{}-{}", t, i);
                        let assistant = format!("a{}-{}", t, i);
                        memory.append_exchange("shared", &user, &assistant);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let turns = memory.session("shared").unwrap();
        assert_eq!(turns.len(), 400);
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }
}
