//! Per-frame orchestration
//!
//! One frame walks a fixed sequence of stages on the current slot:
//!
//! ```text
//! Idle -> WaitFence -> Acquire -> Record -> Submit -> Present -> Idle (next slot)
//! ```
//!
//! The slot's fence is waited and reset before its command buffer is touched,
//! so a slot is never re-recorded while the GPU may still be reading it. The
//! cursor only advances after Present succeeds.

use std::fmt;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Stage of the frame state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    /// Block on the slot fence, then reset it
    WaitFence,
    /// Acquire the next swapchain image
    Acquire,
    /// Re-record the slot command buffer
    Record,
    /// Submit to the graphics queue
    Submit,
    /// Queue the image for presentation
    Present,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitFence => "wait-fence",
            Self::Acquire => "acquire",
            Self::Record => "record",
            Self::Submit => "submit",
            Self::Present => "present",
        };
        f.write_str(name)
    }
}

/// Index of the active frame slot, cycling through `[0, frames_in_flight)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    current: usize,
    frames_in_flight: usize,
}

impl FrameCursor {
    /// Start at slot 0; a slot count of zero is treated as one
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            current: 0,
            frames_in_flight: frames_in_flight.max(1),
        }
    }

    /// Active slot
    pub fn current(&self) -> usize {
        self.current
    }

    /// Number of slots
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Move to the next slot and return it
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.frames_in_flight;
        self.current
    }
}

/// GPU operations the frame loop drives, one call per stage
///
/// `slot` is always below [`FrameBackend::frames_in_flight`].
pub trait FrameBackend {
    /// Number of frame slots provisioned
    fn frames_in_flight(&self) -> usize;

    /// Wait until the slot's previous submission finished, then reset its fence
    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()>;

    /// Acquire the next presentable image, signaling the slot's acquire semaphore
    fn acquire_image(&mut self, slot: usize) -> VulkanResult<u32>;

    /// Reset and record the slot's command buffer for the acquired image
    fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;

    /// Submit the slot's command buffer, signaling its fence on completion
    fn submit(&mut self, slot: usize) -> VulkanResult<()>;

    /// Present the image once the slot's rendering has finished
    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;

    /// Block until the device has no pending work
    fn wait_idle(&mut self) -> VulkanResult<()>;
}

fn at_stage(stage: FrameStage) -> impl Fn(VulkanError) -> VulkanError {
    move |err| match err {
        VulkanError::Api(result) => VulkanError::FrameFailed { stage, result },
        other => other,
    }
}

/// Drives a [`FrameBackend`] one frame at a time
pub struct FrameLoop<B: FrameBackend> {
    backend: B,
    cursor: FrameCursor,
    frames_completed: u64,
}

impl<B: FrameBackend> FrameLoop<B> {
    /// Wrap a backend, starting at slot 0
    pub fn new(backend: B) -> Self {
        let cursor = FrameCursor::new(backend.frames_in_flight());
        Self {
            backend,
            cursor,
            frames_completed: 0,
        }
    }

    /// The backend being driven
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current slot cursor
    pub fn cursor(&self) -> FrameCursor {
        self.cursor
    }

    /// Frames presented so far
    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    /// Run one full frame on the current slot
    ///
    /// API failures are reported as [`VulkanError::FrameFailed`] carrying the
    /// stage that failed. The cursor is left untouched on failure.
    pub fn draw_frame(&mut self) -> VulkanResult<()> {
        let slot = self.cursor.current();

        log::trace!("frame {} slot {slot}: {}", self.frames_completed, FrameStage::WaitFence);
        self.backend.wait_for_slot(slot).map_err(at_stage(FrameStage::WaitFence))?;

        log::trace!("frame {} slot {slot}: {}", self.frames_completed, FrameStage::Acquire);
        let image_index = self.backend.acquire_image(slot).map_err(at_stage(FrameStage::Acquire))?;

        log::trace!("frame {} slot {slot}: {} image {image_index}", self.frames_completed, FrameStage::Record);
        self.backend.record(slot, image_index).map_err(at_stage(FrameStage::Record))?;

        log::trace!("frame {} slot {slot}: {}", self.frames_completed, FrameStage::Submit);
        self.backend.submit(slot).map_err(at_stage(FrameStage::Submit))?;

        log::trace!("frame {} slot {slot}: {}", self.frames_completed, FrameStage::Present);
        self.backend.present(slot, image_index).map_err(at_stage(FrameStage::Present))?;

        self.cursor.advance();
        self.frames_completed += 1;
        Ok(())
    }

    /// Draw frames until `should_quit` returns true or a frame fails
    ///
    /// The device is drained before returning in both cases; the first error
    /// encountered is the one reported.
    pub fn run<F: FnMut() -> bool>(&mut self, mut should_quit: F) -> VulkanResult<()> {
        let mut outcome = Ok(());
        while !should_quit() {
            if let Err(err) = self.draw_frame() {
                outcome = Err(err);
                break;
            }
        }

        let drained = self.shutdown();
        outcome.and(drained)
    }

    /// Wait for the device to go idle and report statistics
    pub fn shutdown(&mut self) -> VulkanResult<()> {
        self.backend.wait_idle()?;
        log::info!("Frame loop stopped after {} frames", self.frames_completed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        Idle,
    }

    /// Backend that models fence state per slot and logs every call
    struct MockBackend {
        frames_in_flight: usize,
        image_count: u32,
        next_image: u32,
        /// Submitted but not yet waited on
        in_flight: Vec<bool>,
        /// Fence was waited and reset since the last submit
        fence_ready: Vec<bool>,
        violations: usize,
        calls: Vec<Call>,
        fail_at: Option<(FrameStage, usize)>,
        stage_counts: [usize; 5],
    }

    impl MockBackend {
        fn new(frames_in_flight: usize) -> Self {
            Self {
                frames_in_flight,
                image_count: 3,
                next_image: 0,
                in_flight: vec![false; frames_in_flight],
                fence_ready: vec![false; frames_in_flight],
                violations: 0,
                calls: Vec::new(),
                fail_at: None,
                stage_counts: [0; 5],
            }
        }

        fn failing(frames_in_flight: usize, stage: FrameStage, nth: usize) -> Self {
            Self {
                fail_at: Some((stage, nth)),
                ..Self::new(frames_in_flight)
            }
        }

        fn enter(&mut self, stage: FrameStage) -> VulkanResult<()> {
            let index = match stage {
                FrameStage::WaitFence => 0,
                FrameStage::Acquire => 1,
                FrameStage::Record => 2,
                FrameStage::Submit => 3,
                FrameStage::Present => 4,
            };
            let nth = self.stage_counts[index];
            self.stage_counts[index] += 1;
            match self.fail_at {
                Some((failing, at)) if failing == stage && at == nth => {
                    Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
                }
                _ => Ok(()),
            }
        }
    }

    impl FrameBackend for MockBackend {
        fn frames_in_flight(&self) -> usize {
            self.frames_in_flight
        }

        fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
            self.enter(FrameStage::WaitFence)?;
            self.calls.push(Call::Wait(slot));
            // The GPU finishes the slot's previous work during the wait
            self.in_flight[slot] = false;
            self.fence_ready[slot] = true;
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> VulkanResult<u32> {
            self.enter(FrameStage::Acquire)?;
            let image = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            self.calls.push(Call::Acquire(slot));
            Ok(image)
        }

        fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
            self.enter(FrameStage::Record)?;
            if self.in_flight[slot] || !self.fence_ready[slot] {
                self.violations += 1;
            }
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> VulkanResult<()> {
            self.enter(FrameStage::Submit)?;
            if self.in_flight[slot] || !self.fence_ready[slot] {
                self.violations += 1;
            }
            self.in_flight[slot] = true;
            self.fence_ready[slot] = false;
            self.calls.push(Call::Submit(slot));
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
            self.enter(FrameStage::Present)?;
            self.calls.push(Call::Present(slot, image_index));
            Ok(())
        }

        fn wait_idle(&mut self) -> VulkanResult<()> {
            self.in_flight.iter_mut().for_each(|f| *f = false);
            self.calls.push(Call::Idle);
            Ok(())
        }
    }

    #[test]
    fn test_cursor_cycles_two_slots() {
        let mut cursor = FrameCursor::new(2);
        let mut seen = vec![cursor.current()];
        for _ in 0..4 {
            seen.push(cursor.advance());
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_cursor_zero_slots_treated_as_one() {
        let mut cursor = FrameCursor::new(0);
        assert_eq!(cursor.frames_in_flight(), 1);
        assert_eq!(cursor.advance(), 0);
    }

    #[test]
    fn test_frames_use_slots_in_order() {
        let mut frame_loop = FrameLoop::new(MockBackend::new(2));
        let mut slots = Vec::new();
        for _ in 0..5 {
            slots.push(frame_loop.cursor().current());
            frame_loop.draw_frame().unwrap();
        }
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(frame_loop.frames_completed(), 5);
    }

    #[test]
    fn test_stage_order_within_frame() {
        let mut frame_loop = FrameLoop::new(MockBackend::new(2));
        frame_loop.draw_frame().unwrap();
        frame_loop.draw_frame().unwrap();
        assert_eq!(
            frame_loop.backend().calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Record(0, 0),
                Call::Submit(0),
                Call::Present(0, 0),
                Call::Wait(1),
                Call::Acquire(1),
                Call::Record(1, 1),
                Call::Submit(1),
                Call::Present(1, 1),
            ]
        );
    }

    #[test]
    fn test_slot_never_reused_before_fence_wait() {
        for frames_in_flight in 1..=3 {
            let mut frame_loop = FrameLoop::new(MockBackend::new(frames_in_flight));
            for _ in 0..10 {
                frame_loop.draw_frame().unwrap();
            }
            assert_eq!(frame_loop.backend().violations, 0);
        }
    }

    #[test]
    fn test_failure_reports_stage_and_keeps_cursor() {
        for stage in [
            FrameStage::WaitFence,
            FrameStage::Acquire,
            FrameStage::Record,
            FrameStage::Submit,
            FrameStage::Present,
        ] {
            let mut frame_loop = FrameLoop::new(MockBackend::failing(2, stage, 1));
            frame_loop.draw_frame().unwrap();
            assert_eq!(frame_loop.cursor().current(), 1);

            let err = frame_loop.draw_frame().unwrap_err();
            match err {
                VulkanError::FrameFailed { stage: failed, result } => {
                    assert_eq!(failed, stage);
                    assert_eq!(result, vk::Result::ERROR_DEVICE_LOST);
                }
                other => panic!("unexpected error {other:?}"),
            }
            assert_eq!(frame_loop.cursor().current(), 1);
            assert_eq!(frame_loop.frames_completed(), 1);
        }
    }

    #[test]
    fn test_run_until_quit_then_drains_device() {
        let mut frame_loop = FrameLoop::new(MockBackend::new(2));
        let mut remaining = 3;
        frame_loop
            .run(|| {
                if remaining == 0 {
                    return true;
                }
                remaining -= 1;
                false
            })
            .unwrap();

        assert_eq!(frame_loop.frames_completed(), 3);
        assert_eq!(frame_loop.backend().calls.last(), Some(&Call::Idle));
    }

    #[test]
    fn test_run_drains_device_after_failure() {
        let mut frame_loop = FrameLoop::new(MockBackend::failing(2, FrameStage::Acquire, 2));
        let err = frame_loop.run(|| false).unwrap_err();

        assert!(matches!(err, VulkanError::FrameFailed { stage: FrameStage::Acquire, .. }));
        assert_eq!(frame_loop.frames_completed(), 2);
        assert_eq!(frame_loop.backend().calls.last(), Some(&Call::Idle));
    }

    #[test]
    fn test_non_api_errors_pass_through() {
        let err = at_stage(FrameStage::Record)(VulkanError::InvalidOperation { reason: "x".to_string() });
        assert!(matches!(err, VulkanError::InvalidOperation { .. }));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(FrameStage::WaitFence.to_string(), "wait-fence");
        assert_eq!(FrameStage::Present.to_string(), "present");
    }
}
