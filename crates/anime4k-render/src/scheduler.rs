//! Frame-synchronized render loop state
//!
//! The scheduler does not render anything itself. It tracks which phase the
//! loop is in and the handle of the pending display-frame callback, and tells
//! the engine what a finished tick means. Keeping both in one
//! [`SchedulerState`] value means a destroyed engine can never hold a live
//! callback registration.

use crate::error::Result;
use crate::video::{FrameCallbackId, FrameClock};

/// Phase of the render loop together with its pending callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No frame has been presented yet
    AwaitingFirstFrame { pending: Option<FrameCallbackId> },
    /// At least one frame has been presented
    SteadyState { pending: Option<FrameCallbackId> },
    /// Terminal; no callbacks are pending or will be requested
    Destroyed,
}

/// What the engine should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The first frame was just presented; the loop moved to steady state
    FirstFrameRendered,
    /// The loop continues with the next displayed frame
    Continue,
    /// The engine was destroyed during or before the tick
    Stopped,
}

/// Drives per-frame work from a video's display clock
#[derive(Debug)]
pub struct FrameScheduler {
    state: SchedulerState,
}

impl FrameScheduler {
    /// A scheduler waiting for its first frame with nothing armed yet
    pub fn new() -> Self {
        Self {
            state: SchedulerState::AwaitingFirstFrame { pending: None },
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == SchedulerState::Destroyed
    }

    pub fn has_rendered_first_frame(&self) -> bool {
        matches!(self.state, SchedulerState::SteadyState { .. })
    }

    /// Requests a callback for the next displayed frame, unless one is pending
    ///
    /// # Errors
    /// Propagates a refused request; nothing is pending afterwards.
    pub fn arm(&mut self, clock: &mut impl FrameClock) -> Result<()> {
        match &mut self.state {
            SchedulerState::AwaitingFirstFrame { pending } | SchedulerState::SteadyState { pending } => {
                if pending.is_none() {
                    *pending = Some(clock.request_frame_callback()?);
                }
                Ok(())
            }
            SchedulerState::Destroyed => Ok(()),
        }
    }

    /// Marks the pending callback as fired
    ///
    /// # Returns
    /// `false` for a late tick arriving after destruction, which must do nothing
    pub fn begin_tick(&mut self) -> bool {
        match &mut self.state {
            SchedulerState::AwaitingFirstFrame { pending } | SchedulerState::SteadyState { pending } => {
                *pending = None;
                true
            }
            SchedulerState::Destroyed => false,
        }
    }

    /// Advances the phase after `process_frame` and re-arms the callback
    ///
    /// # Arguments
    /// * `rendered` - Whether the tick presented a frame
    /// * `clock` - Display clock to re-arm on
    ///
    /// # Errors
    /// Returns the clock's error when the next callback cannot be requested.
    /// The phase has already advanced; the caller decides whether to shut down.
    pub fn complete_tick(&mut self, rendered: bool, clock: &mut impl FrameClock) -> Result<TickOutcome> {
        let outcome = match self.state {
            SchedulerState::Destroyed => return Ok(TickOutcome::Stopped),
            SchedulerState::AwaitingFirstFrame { pending } if rendered => {
                self.state = SchedulerState::SteadyState { pending };
                TickOutcome::FirstFrameRendered
            }
            SchedulerState::AwaitingFirstFrame { .. } | SchedulerState::SteadyState { .. } => TickOutcome::Continue,
        };

        self.arm(clock)?;
        Ok(outcome)
    }

    /// Enters the terminal state and cancels any pending callback
    ///
    /// # Returns
    /// `false` if the scheduler was already destroyed
    pub fn shut_down(&mut self, clock: &mut impl FrameClock) -> bool {
        let previous = std::mem::replace(&mut self.state, SchedulerState::Destroyed);
        match previous {
            SchedulerState::AwaitingFirstFrame { pending } | SchedulerState::SteadyState { pending } => {
                if let Some(id) = pending {
                    clock.cancel_frame_callback(id);
                }
                true
            }
            SchedulerState::Destroyed => false,
        }
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::Dimensions;
    use crate::error::EngineError;
    use crate::testing::MockVideo;

    fn video() -> MockVideo {
        MockVideo::new(Dimensions::new(640, 360))
    }

    #[test]
    fn test_first_frame_transition() {
        let mut clock = video();
        let mut scheduler = FrameScheduler::new();
        scheduler.arm(&mut clock).unwrap();
        assert_eq!(scheduler.state(), SchedulerState::AwaitingFirstFrame { pending: Some(FrameCallbackId(1)) });

        // Not ready: the same phase re-arms
        assert!(clock.fire());
        assert!(scheduler.begin_tick());
        assert_eq!(scheduler.complete_tick(false, &mut clock).unwrap(), TickOutcome::Continue);
        assert!(!scheduler.has_rendered_first_frame());

        assert!(clock.fire());
        assert!(scheduler.begin_tick());
        assert_eq!(scheduler.complete_tick(true, &mut clock).unwrap(), TickOutcome::FirstFrameRendered);
        assert_eq!(scheduler.state(), SchedulerState::SteadyState { pending: Some(FrameCallbackId(3)) });

        // Steady state ignores the result
        assert!(clock.fire());
        assert!(scheduler.begin_tick());
        assert_eq!(scheduler.complete_tick(true, &mut clock).unwrap(), TickOutcome::Continue);
        assert_eq!(clock.state().requested_callbacks, 4);
    }

    #[test]
    fn test_arm_does_not_double_register() {
        let mut clock = video();
        let mut scheduler = FrameScheduler::new();
        scheduler.arm(&mut clock).unwrap();
        scheduler.arm(&mut clock).unwrap();
        assert_eq!(clock.state().requested_callbacks, 1);
    }

    #[test]
    fn test_shut_down_cancels_pending_once() {
        let mut clock = video();
        let mut scheduler = FrameScheduler::new();
        scheduler.arm(&mut clock).unwrap();

        assert!(scheduler.shut_down(&mut clock));
        assert!(!scheduler.shut_down(&mut clock));
        assert_eq!(clock.state().cancelled_callbacks, vec![FrameCallbackId(1)]);
        assert!(clock.state().pending_callbacks.is_empty());
    }

    #[test]
    fn test_late_tick_is_ignored() {
        let mut clock = video();
        let mut scheduler = FrameScheduler::new();
        scheduler.arm(&mut clock).unwrap();
        scheduler.shut_down(&mut clock);

        assert!(!scheduler.begin_tick());
        assert_eq!(scheduler.complete_tick(true, &mut clock).unwrap(), TickOutcome::Stopped);
        scheduler.arm(&mut clock).unwrap();
        assert_eq!(clock.state().requested_callbacks, 1);
    }

    #[test]
    fn test_destroyed_during_tick_does_not_rearm() {
        let mut clock = video();
        let mut scheduler = FrameScheduler::new();
        scheduler.arm(&mut clock).unwrap();

        assert!(clock.fire());
        assert!(scheduler.begin_tick());
        // Fatal error inside process_frame
        assert!(scheduler.shut_down(&mut clock));
        assert_eq!(scheduler.complete_tick(false, &mut clock).unwrap(), TickOutcome::Stopped);
        assert!(clock.state().cancelled_callbacks.is_empty());
        assert_eq!(clock.state().requested_callbacks, 1);
    }

    #[test]
    fn test_refused_request_leaves_nothing_pending() {
        let mut clock = video();
        clock.state().fail_request = true;
        let mut scheduler = FrameScheduler::new();

        assert!(matches!(scheduler.arm(&mut clock), Err(EngineError::FrameCallback(_))));
        assert_eq!(scheduler.state(), SchedulerState::AwaitingFirstFrame { pending: None });
        assert_eq!(clock.state().requested_callbacks, 0);
    }

    #[test]
    fn test_refused_rearm_is_reported_after_the_phase_advances() {
        let mut clock = video();
        let mut scheduler = FrameScheduler::new();
        scheduler.arm(&mut clock).unwrap();

        assert!(clock.fire());
        assert!(scheduler.begin_tick());
        clock.state().fail_request = true;
        assert!(scheduler.complete_tick(true, &mut clock).is_err());
        assert_eq!(scheduler.state(), SchedulerState::SteadyState { pending: None });
    }
}
