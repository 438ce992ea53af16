use ash::vk;
use log::*;

use super::RendererError;

/// Where a frame slot is in its acquire-record-submit-present cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Image { index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Present {
    Done { suboptimal: bool },
    OutOfDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// the frame was submitted and queued for presentation
    Presented { recreated: bool },
    /// acquisition found the swapchain stale; it was rebuilt and nothing was submitted
    Recreated,
}

/// The GPU-facing half of a frame
///
/// Implemented by the renderer; the scheduler only decides ordering.
pub trait FrameBackend {
    fn image_count(&self) -> usize;

    /// block until the slot's previous submission has finished
    fn wait_for_slot(&mut self, slot: usize) -> Result<(), RendererError>;

    fn acquire_image(&mut self, slot: usize) -> Result<Acquire, RendererError>;

    fn update_uniforms(&mut self, slot: usize);

    /// unsignal the slot fence; only called right before a submission
    fn reset_slot(&mut self, slot: usize) -> Result<(), RendererError>;

    fn record(&mut self, slot: usize, image_index: u32) -> Result<(), RendererError>;

    fn submit(&mut self, slot: usize) -> Result<(), RendererError>;

    fn present(&mut self, slot: usize, image_index: u32) -> Result<Present, RendererError>;

    /// rebuild everything that depends on the swapchain
    fn recreate(&mut self) -> Result<(), RendererError>;
}

/// Drives F frames in flight over a swapchain of N images
pub struct FrameScheduler {
    current_slot: usize,
    slot_states: Vec<SlotState>,
    /// for each swapchain image, the slot whose submission last used it
    images_in_flight: Vec<Option<usize>>,
    resize_requested: bool,
}

impl FrameScheduler {
    pub fn new(frames_in_flight: usize, image_count: usize) -> Self {
        assert!(frames_in_flight > 0, "at least one frame in flight");

        Self {
            current_slot: 0,
            slot_states: vec![SlotState::Idle; frames_in_flight],
            images_in_flight: vec![None; image_count],
            resize_requested: false,
        }
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn slot_state(&self, slot: usize) -> SlotState {
        self.slot_states[slot]
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slot_states.len()
    }

    pub fn image_owner(&self, image_index: usize) -> Option<usize> {
        self.images_in_flight[image_index]
    }

    /// Requests a recreation after the next present
    pub fn flag_resize(&mut self) {
        self.resize_requested = true;
    }

    pub fn resize_requested(&self) -> bool {
        self.resize_requested
    }

    /// Rebuilds the swapchain outside of a frame, e.g. after a minimized window is restored
    pub fn recreate(&mut self, backend: &mut impl FrameBackend) -> Result<(), RendererError> {
        backend.recreate()?;

        // recreation idles the device, so no image is owned any more
        self.images_in_flight = vec![None; backend.image_count()];
        self.resize_requested = false;
        for state in &mut self.slot_states {
            *state = SlotState::Idle;
        }

        Ok(())
    }

    pub fn draw_frame(
        &mut self,
        backend: &mut impl FrameBackend,
    ) -> Result<FrameOutcome, RendererError> {
        let slot = self.current_slot;

        self.transition(slot, SlotState::Acquiring);
        backend.wait_for_slot(slot)?;

        let (image_index, acquire_suboptimal) = match backend.acquire_image(slot)? {
            Acquire::Image { index, suboptimal } => (index, suboptimal),
            Acquire::OutOfDate => {
                debug!("swapchain out of date on acquire");
                // the slot fence is still signaled, so the slot is reused next tick
                self.recreate(backend)?;
                return Ok(FrameOutcome::Recreated);
            }
        };

        self.transition(slot, SlotState::Recording);
        let image = image_index as usize;
        if let Some(owner) = self.images_in_flight[image] {
            if owner != slot {
                backend.wait_for_slot(owner)?;
            }
        }
        self.images_in_flight[image] = Some(slot);

        backend.update_uniforms(slot);
        backend.reset_slot(slot)?;
        backend.record(slot, image_index)?;

        backend.submit(slot)?;
        self.transition(slot, SlotState::Submitted);

        self.transition(slot, SlotState::Presenting);
        let present_stale = match backend.present(slot, image_index)? {
            Present::Done { suboptimal } => suboptimal,
            Present::OutOfDate => true,
        };

        let recreated = acquire_suboptimal || present_stale || self.resize_requested;
        if recreated {
            debug!(
                "recreating after present (suboptimal: {acquire_suboptimal}, stale: {present_stale}, resized: {})",
                self.resize_requested
            );
            self.recreate(backend)?;
        } else {
            self.transition(slot, SlotState::Idle);
        }

        self.current_slot = (slot + 1) % self.frames_in_flight();

        Ok(FrameOutcome::Presented { recreated })
    }

    fn transition(&mut self, slot: usize, state: SlotState) {
        trace!("frame slot {slot}: {:?} -> {state:?}", self.slot_states[slot]);
        self.slot_states[slot] = state;
    }
}

/// Per-slot semaphores and fences
pub struct FrameSync {
    pub image_available: Vec<vk::Semaphore>,
    pub render_finished: Vec<vk::Semaphore>,
    pub in_flight: Vec<vk::Fence>,
    device: ash::Device,
}

impl FrameSync {
    pub fn create(device: &ash::Device, frames_in_flight: usize) -> Result<Self, RendererError> {
        let mut sync = Self {
            image_available: Vec::with_capacity(frames_in_flight),
            render_finished: Vec::with_capacity(frames_in_flight),
            in_flight: Vec::with_capacity(frames_in_flight),
            device: device.clone(),
        };

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        // signaled, so the first wait on each slot returns immediately
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

        for _ in 0..frames_in_flight {
            unsafe {
                sync.image_available
                    .push(device.create_semaphore(&semaphore_info, None)?);
                sync.render_finished
                    .push(device.create_semaphore(&semaphore_info, None)?);
                sync.in_flight.push(device.create_fence(&fence_info, None)?);
            }
        }

        Ok(sync)
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            for &semaphore in self.image_available.iter().chain(&self.render_finished) {
                self.device.destroy_semaphore(semaphore, None);
            }
            for &fence in &self.in_flight {
                self.device.destroy_fence(fence, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    const FRAMES: usize = 2;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Uniforms(usize),
        Reset(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        Recreate,
    }

    /// Scripted stand-in for the GPU
    ///
    /// Submissions stay outstanding until the slot is waited on, which is
    /// when a real fence would be observed signaled.
    struct FakeGpu {
        image_count: usize,
        next_image: u32,
        acquire_script: VecDeque<Acquire>,
        present_script: VecDeque<Present>,
        outstanding: Vec<Option<u32>>,
        max_outstanding: usize,
        fail_wait: bool,
        calls: Vec<Call>,
    }

    impl FakeGpu {
        fn new(image_count: usize) -> Self {
            Self {
                image_count,
                next_image: 0,
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                outstanding: vec![None; FRAMES],
                max_outstanding: 0,
                fail_wait: false,
                calls: vec![],
            }
        }

        fn count(&self, call: &Call) -> usize {
            self.calls.iter().filter(|c| *c == call).count()
        }

        fn submissions(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Submit(_)))
                .count()
        }
    }

    impl FrameBackend for FakeGpu {
        fn image_count(&self) -> usize {
            self.image_count
        }

        fn wait_for_slot(&mut self, slot: usize) -> Result<(), RendererError> {
            if self.fail_wait {
                return Err(RendererError::FenceTimeout);
            }
            self.calls.push(Call::Wait(slot));
            self.outstanding[slot] = None;
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> Result<Acquire, RendererError> {
            self.calls.push(Call::Acquire(slot));
            if let Some(scripted) = self.acquire_script.pop_front() {
                return Ok(scripted);
            }

            let index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count as u32;
            Ok(Acquire::Image {
                index,
                suboptimal: false,
            })
        }

        fn update_uniforms(&mut self, slot: usize) {
            assert!(
                self.outstanding[slot].is_none(),
                "uniforms for slot {slot} written while the GPU may read them"
            );
            self.calls.push(Call::Uniforms(slot));
        }

        fn reset_slot(&mut self, slot: usize) -> Result<(), RendererError> {
            assert!(
                self.outstanding[slot].is_none(),
                "fence for slot {slot} reset while outstanding"
            );
            self.calls.push(Call::Reset(slot));
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32) -> Result<(), RendererError> {
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> Result<(), RendererError> {
            let image_index = match self.calls.last() {
                Some(Call::Record(s, image_index)) if *s == slot => *image_index,
                other => panic!("submit without a recording, last call {other:?}"),
            };
            assert!(
                !self.outstanding.contains(&Some(image_index)),
                "image {image_index} submitted while a previous submission is unresolved"
            );

            self.calls.push(Call::Submit(slot));
            self.outstanding[slot] = Some(image_index);
            let outstanding = self.outstanding.iter().flatten().count();
            self.max_outstanding = self.max_outstanding.max(outstanding);
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> Result<Present, RendererError> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self
                .present_script
                .pop_front()
                .unwrap_or(Present::Done { suboptimal: false }))
        }

        fn recreate(&mut self) -> Result<(), RendererError> {
            // recreation waits for the device to go idle
            self.outstanding = vec![None; FRAMES];
            self.next_image = 0;
            self.calls.push(Call::Recreate);
            Ok(())
        }
    }

    fn draw(scheduler: &mut FrameScheduler, gpu: &mut FakeGpu, frames: usize) {
        for _ in 0..frames {
            scheduler.draw_frame(gpu).unwrap();
        }
    }

    #[test]
    fn one_frame_runs_in_order() {
        let mut gpu = FakeGpu::new(3);
        let mut scheduler = FrameScheduler::new(FRAMES, 3);

        let outcome = scheduler.draw_frame(&mut gpu).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { recreated: false });
        assert_eq!(
            gpu.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Uniforms(0),
                Call::Reset(0),
                Call::Record(0, 0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(scheduler.current_slot(), 1);
        assert_eq!(scheduler.slot_state(0), SlotState::Idle);
        assert_eq!(scheduler.image_owner(0), Some(0));
    }

    #[test]
    fn slots_advance_modulo_frames_in_flight() {
        let mut gpu = FakeGpu::new(3);
        let mut scheduler = FrameScheduler::new(FRAMES, 3);

        draw(&mut scheduler, &mut gpu, 5);

        assert_eq!(scheduler.current_slot(), 1);
        let submitted: Vec<usize> = gpu
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Submit(slot) => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(submitted, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn never_more_than_frames_in_flight_outstanding() {
        for image_count in [2, 3, 4] {
            let mut gpu = FakeGpu::new(image_count);
            let mut scheduler = FrameScheduler::new(FRAMES, image_count);

            draw(&mut scheduler, &mut gpu, 20);

            assert_eq!(gpu.submissions(), 20);
            assert!(gpu.max_outstanding <= FRAMES);
        }
    }

    #[test]
    fn image_owned_by_another_slot_is_waited_on() {
        let mut gpu = FakeGpu::new(3);
        let mut scheduler = FrameScheduler::new(FRAMES, 3);

        // slot 0 takes image 0, slot 1 gets image 0 back before slot 0 is waited on again
        gpu.acquire_script.extend([
            Acquire::Image {
                index: 0,
                suboptimal: false,
            },
            Acquire::Image {
                index: 0,
                suboptimal: false,
            },
        ]);

        draw(&mut scheduler, &mut gpu, 2);

        let second_frame = &gpu.calls[7..];
        assert_eq!(
            second_frame[..3],
            [Call::Wait(1), Call::Acquire(1), Call::Wait(0)]
        );
        assert_eq!(scheduler.image_owner(0), Some(1));
    }

    #[test]
    fn out_of_date_acquire_skips_the_frame_and_recreates_once() {
        let mut gpu = FakeGpu::new(3);
        let mut scheduler = FrameScheduler::new(FRAMES, 3);

        draw(&mut scheduler, &mut gpu, 1);
        gpu.acquire_script.push_back(Acquire::OutOfDate);

        let outcome = scheduler.draw_frame(&mut gpu).unwrap();
        assert_eq!(outcome, FrameOutcome::Recreated);
        assert_eq!(gpu.submissions(), 1);
        assert_eq!(gpu.count(&Call::Recreate), 1);
        assert_eq!(gpu.calls.last(), Some(&Call::Recreate));

        // the skipped frame's slot is retried
        assert_eq!(scheduler.current_slot(), 1);
        draw(&mut scheduler, &mut gpu, 1);
        assert_eq!(gpu.submissions(), 2);
        assert_eq!(gpu.count(&Call::Recreate), 1);
    }

    #[test]
    fn suboptimal_acquire_presents_then_recreates() {
        let mut gpu = FakeGpu::new(3);
        let mut scheduler = FrameScheduler::new(FRAMES, 3);
        gpu.acquire_script.push_back(Acquire::Image {
            index: 1,
            suboptimal: true,
        });

        let outcome = scheduler.draw_frame(&mut gpu).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { recreated: true });
        let n = gpu.calls.len();
        assert_eq!(gpu.calls[n - 2..], [Call::Present(0, 1), Call::Recreate]);
        assert_eq!(scheduler.current_slot(), 1);
    }

    #[test]
    fn stale_present_recreates() {
        let mut gpu = FakeGpu::new(3);
        let mut scheduler = FrameScheduler::new(FRAMES, 3);
        gpu.present_script
            .extend([Present::OutOfDate, Present::Done { suboptimal: true }]);

        draw(&mut scheduler, &mut gpu, 3);

        assert_eq!(gpu.submissions(), 3);
        assert_eq!(gpu.count(&Call::Recreate), 2);
    }

    #[test]
    fn resize_flag_recreates_after_present() {
        let mut gpu = FakeGpu::new(3);
        let mut scheduler = FrameScheduler::new(FRAMES, 3);

        scheduler.flag_resize();
        let outcome = scheduler.draw_frame(&mut gpu).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented { recreated: true });
        assert!(!scheduler.resize_requested());
        assert_eq!(gpu.count(&Call::Recreate), 1);

        draw(&mut scheduler, &mut gpu, 2);
        assert_eq!(gpu.count(&Call::Recreate), 1);
    }

    #[test]
    fn recreation_resizes_the_ownership_table() {
        let mut gpu = FakeGpu::new(3);
        let mut scheduler = FrameScheduler::new(FRAMES, 3);
        draw(&mut scheduler, &mut gpu, 3);
        assert_eq!(scheduler.image_owner(2), Some(0));

        gpu.image_count = 4;
        scheduler.recreate(&mut gpu).unwrap();

        assert_eq!(scheduler.images_in_flight, vec![None; 4]);
        draw(&mut scheduler, &mut gpu, 4);
        // slot 1 resumes on image 0, so image 3 goes to slot 0
        assert_eq!(scheduler.image_owner(3), Some(0));
    }

    #[test]
    fn fence_timeout_is_fatal() {
        let mut gpu = FakeGpu::new(3);
        let mut scheduler = FrameScheduler::new(FRAMES, 3);
        gpu.fail_wait = true;

        let result = scheduler.draw_frame(&mut gpu);

        assert!(matches!(result, Err(RendererError::FenceTimeout)));
        assert_eq!(gpu.submissions(), 0);
    }

    #[test]
    #[should_panic(expected = "at least one frame in flight")]
    fn zero_frames_in_flight_panics() {
        FrameScheduler::new(0, 3);
    }
}
