//! Per-frame slot lifecycle
//!
//! There is one slot per swapchain image. A slot moves
//! `Idle → Recording → InFlight` each time it is used; acquiring it again
//! (after the backend's fence wait) moves it back to `Recording`.

use thiserror::Error;

/// State of one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never used since the last rebuild
    Idle,
    /// Uniforms and commands are being written
    Recording,
    /// Submitted as frame number `frame`
    InFlight {
        /// Monotonic frame counter at submission
        frame: u64,
    },
}

/// Slot lifecycle violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameSlotError {
    /// Slot index outside the current slot count
    #[error("Frame slot {slot} out of range ({count} slots)")]
    OutOfRange {
        /// Requested slot
        slot: usize,
        /// Number of slots
        count: usize,
    },

    /// The slot is already being recorded
    #[error("Frame slot {0} is already recording")]
    AlreadyRecording(usize),

    /// Submission of a slot that is not recording
    #[error("Frame slot {0} is not recording")]
    NotRecording(usize),
}

/// Tracks the lifecycle of every frame slot
#[derive(Debug, Clone)]
pub struct FrameSlots {
    states: Vec<SlotState>,
    next_frame: u64,
}

impl FrameSlots {
    /// Create `count` idle slots
    pub fn new(count: usize) -> Self {
        Self {
            states: vec![SlotState::Idle; count],
            next_frame: 0,
        }
    }

    /// Replace all slots with `count` idle ones.
    ///
    /// Only valid once the device is idle, as after a surface rebuild.
    pub fn reset(&mut self, count: usize) {
        self.states.clear();
        self.states.resize(count, SlotState::Idle);
    }

    fn check(&self, slot: usize) -> Result<SlotState, FrameSlotError> {
        self.states.get(slot).copied().ok_or(FrameSlotError::OutOfRange {
            slot,
            count: self.states.len(),
        })
    }

    /// Start recording into an acquired slot
    pub fn begin_recording(&mut self, slot: usize) -> Result<(), FrameSlotError> {
        match self.check(slot)? {
            SlotState::Recording => Err(FrameSlotError::AlreadyRecording(slot)),
            SlotState::Idle | SlotState::InFlight { .. } => {
                self.states[slot] = SlotState::Recording;
                Ok(())
            }
        }
    }

    /// Mark a recording slot as submitted and return its frame number
    pub fn mark_submitted(&mut self, slot: usize) -> Result<u64, FrameSlotError> {
        match self.check(slot)? {
            SlotState::Recording => {
                let frame = self.next_frame;
                self.next_frame += 1;
                self.states[slot] = SlotState::InFlight { frame };
                Ok(frame)
            }
            _ => Err(FrameSlotError::NotRecording(slot)),
        }
    }

    /// Drop a recording that will not be submitted
    pub fn abandon(&mut self, slot: usize) {
        if let Some(state @ SlotState::Recording) = self.states.get_mut(slot) {
            *state = SlotState::Idle;
        }
    }

    /// State of a slot
    pub fn state(&self, slot: usize) -> Option<SlotState> {
        self.states.get(slot).copied()
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether there are no slots
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Frames submitted so far
    pub fn frames_submitted(&self) -> u64 {
        self.next_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_cycles_through_states() {
        let mut slots = FrameSlots::new(2);
        assert_eq!(slots.state(0), Some(SlotState::Idle));

        slots.begin_recording(0).unwrap();
        assert_eq!(slots.state(0), Some(SlotState::Recording));

        assert_eq!(slots.mark_submitted(0), Ok(0));
        assert_eq!(slots.state(0), Some(SlotState::InFlight { frame: 0 }));

        slots.begin_recording(0).unwrap();
        assert_eq!(slots.mark_submitted(0), Ok(1));
        assert_eq!(slots.frames_submitted(), 2);
    }

    #[test]
    fn test_double_recording_is_rejected() {
        let mut slots = FrameSlots::new(3);
        slots.begin_recording(1).unwrap();
        assert_eq!(slots.begin_recording(1), Err(FrameSlotError::AlreadyRecording(1)));
    }

    #[test]
    fn test_submit_requires_recording() {
        let mut slots = FrameSlots::new(2);
        assert_eq!(slots.mark_submitted(1), Err(FrameSlotError::NotRecording(1)));
    }

    #[test]
    fn test_out_of_range_slot() {
        let mut slots = FrameSlots::new(2);
        assert_eq!(
            slots.begin_recording(2),
            Err(FrameSlotError::OutOfRange { slot: 2, count: 2 })
        );
    }

    #[test]
    fn test_reset_resizes_to_new_count() {
        let mut slots = FrameSlots::new(2);
        slots.begin_recording(0).unwrap();
        slots.mark_submitted(0).unwrap();

        slots.reset(3);

        assert_eq!(slots.len(), 3);
        assert!((0..3).all(|i| slots.state(i) == Some(SlotState::Idle)));
        assert_eq!(slots.frames_submitted(), 1);
    }

    #[test]
    fn test_abandon_returns_to_idle() {
        let mut slots = FrameSlots::new(1);
        slots.begin_recording(0).unwrap();
        slots.abandon(0);
        assert_eq!(slots.state(0), Some(SlotState::Idle));
    }
}
