//! Input validation and per-player command queueing
//!
//! Raw input messages are filtered field-by-field against the recognized
//! action set, stamped with a latency-corrected timestamp, and buffered in a
//! FIFO queue that the simulation loop pops from one command per sub-step.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ws::protocol::GameInput;

/// A validated input command queued for the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct InputCommand {
    /// Client step counter, echoed back in the snapshot acknowledgment
    pub step: u32,
    /// Client clock at sampling time (ms)
    pub timestamp: f64,
    /// Receive time minus the sender's average latency (server ms). High
    /// latency clients have their commands backdated further.
    pub corrected_timestamp: f64,
    /// Pressed actions after filtering
    keys: HashSet<GameInput>,
}

impl InputCommand {
    pub fn pressed(&self, action: GameInput) -> bool {
        self.keys.contains(&action)
    }

    pub fn is_idle(&self) -> bool {
        self.keys.is_empty()
    }

    /// A command with nothing pressed, used when a player's queue runs dry
    /// mid-interlace (the vehicle coasts).
    pub fn idle() -> Self {
        Self {
            step: 0,
            timestamp: 0.0,
            corrected_timestamp: 0.0,
            keys: HashSet::new(),
        }
    }
}

/// FIFO queue of commands for one player, drained every simulation tick
#[derive(Debug, Default)]
pub struct InputQueue {
    commands: VecDeque<InputCommand>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: InputCommand) {
        self.commands.push_back(cmd);
    }

    pub fn pop(&mut self) -> Option<InputCommand> {
        self.commands.pop_front()
    }

    pub fn peek(&self) -> Option<&InputCommand> {
        self.commands.front()
    }

    pub fn peek_last(&self) -> Option<&InputCommand> {
        self.commands.back()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

/// Per-player input intake: validates, stamps and queues raw messages
#[derive(Debug, Default)]
pub struct InputManager {
    queue: InputQueue,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a raw key map and queue the resulting command.
    ///
    /// Unrecognized keys are dropped silently; a message mixing good and bad
    /// keys keeps the good ones. `now_ms` is the server receive time and
    /// `avg_ping_ms` the sender's current latency estimate.
    pub fn submit(
        &mut self,
        step: u32,
        timestamp: f64,
        raw_keys: &HashMap<String, bool>,
        avg_ping_ms: f64,
        now_ms: f64,
    ) {
        let keys = Self::validate(raw_keys);
        self.queue.push(InputCommand {
            step,
            timestamp,
            corrected_timestamp: now_ms - avg_ping_ms,
            keys,
        });
    }

    /// Keep only pressed, recognized actions
    fn validate(raw_keys: &HashMap<String, bool>) -> HashSet<GameInput> {
        raw_keys
            .iter()
            .filter(|(_, pressed)| **pressed)
            .filter_map(|(key, _)| GameInput::from_wire(key))
            .collect()
    }

    pub fn queue(&self) -> &InputQueue {
        &self.queue
    }

    /// Take the oldest queued command, if any
    pub fn pop(&mut self) -> Option<InputCommand> {
        self.queue.pop()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn unknown_keys_are_stripped_without_error() {
        let mut mgr = InputManager::new();
        mgr.submit(
            1,
            100.0,
            &raw(&[("forward", true), ("jetpack", true), ("fire", true)]),
            0.0,
            100.0,
        );

        let cmd = mgr.pop().unwrap();
        assert!(cmd.pressed(GameInput::Forward));
        assert!(cmd.pressed(GameInput::Fire));
        assert!(!cmd.is_idle());
        assert!(mgr.queue().is_empty());
    }

    #[test]
    fn partially_bad_command_keeps_good_keys() {
        let mut mgr = InputManager::new();
        mgr.submit(
            1,
            0.0,
            &raw(&[("warp_drive", true), ("left", true)]),
            0.0,
            0.0,
        );

        let cmd = mgr.pop().unwrap();
        assert!(cmd.pressed(GameInput::Left));
    }

    #[test]
    fn released_keys_are_not_recorded_as_pressed() {
        let mut mgr = InputManager::new();
        mgr.submit(1, 0.0, &raw(&[("forward", false), ("brake", true)]), 0.0, 0.0);

        let cmd = mgr.pop().unwrap();
        assert!(!cmd.pressed(GameInput::Forward));
        assert!(cmd.pressed(GameInput::Brake));
    }

    #[test]
    fn pop_returns_commands_in_receipt_order() {
        let mut mgr = InputManager::new();
        for step in 0..5u32 {
            mgr.submit(step, step as f64, &raw(&[("forward", true)]), 0.0, 0.0);
        }

        let mut steps = Vec::new();
        while let Some(cmd) = mgr.pop() {
            steps.push(cmd.step);
        }
        assert_eq!(steps, vec![0, 1, 2, 3, 4]);
        assert!(mgr.queue().is_empty());
    }

    #[test]
    fn corrected_timestamp_backdates_by_average_ping() {
        let mut mgr = InputManager::new();
        mgr.submit(1, 500.0, &raw(&[("fire", true)]), 80.0, 1000.0);

        let cmd = mgr.pop().unwrap();
        assert_eq!(cmd.corrected_timestamp, 920.0);
        // The raw client timestamp is preserved for acknowledgment
        assert_eq!(cmd.timestamp, 500.0);
    }

    #[test]
    fn queue_supports_peek_at_both_ends() {
        let mut queue = InputQueue::new();
        assert!(queue.peek().is_none());

        for step in 1..=3u32 {
            queue.push(InputCommand {
                step,
                timestamp: 0.0,
                corrected_timestamp: 0.0,
                keys: HashSet::new(),
            });
        }

        assert_eq!(queue.peek().unwrap().step, 1);
        assert_eq!(queue.peek_last().unwrap().step, 3);
        assert_eq!(queue.len(), 3);

        queue.clear();
        assert!(queue.is_empty());
    }
}
