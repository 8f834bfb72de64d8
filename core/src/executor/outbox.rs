//! Effect outbox
//!
//! `emit(value)` records an effect here instead of performing I/O. The driver
//! drains the outbox between control operations and decides what to do with
//! the effects; the outbox travels with the VM when it is serialized.

use super::types::Val;
use serde::{Deserialize, Serialize};

/// One value emitted by the procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Monotonic sequence number, unique for the lifetime of a computation
    pub seq: u64,
    pub value: Val,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outbox {
    next_seq: u64,
    effects: Vec<Effect>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Val) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.effects.push(Effect { seq, value });
    }

    /// Take every pending effect, oldest first
    pub fn drain(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_survives_drain() {
        let mut outbox = Outbox::new();
        outbox.push(Val::from("a"));
        outbox.push(Val::from("b"));

        let first = outbox.drain();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].seq, 1);
        assert!(outbox.is_empty());

        outbox.push(Val::from("c"));
        assert_eq!(outbox.effects()[0].seq, 2);
    }
}
