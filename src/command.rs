//! Thin abstraction over the command queue, plus a reuse-tracking pool that bounds the
//! number of command objects outstanding on the GPU at once.
//!
//! The source this crate is grounded on keys a dictionary on the *identity* of command
//! objects to count in-flight work. That does not translate to Rust: instead, the pool is
//! a dense slab of slots (a `Vec<bool>`), and a [`CommandObject`] carries the index of the
//! slot it occupies. The slot is released either when the object is dropped before
//! submission (cancellation) or, once `submit` is called, when the GPU signals completion.

use std::sync::{Arc, Mutex};

use crate::error::SortError;

struct Slab {
    occupied: Vec<bool>,
}

impl Slab {
    fn acquire(&mut self) -> Option<usize> {
        let slot = self.occupied.iter().position(|b| !b)?;
        self.occupied[slot] = true;
        Some(slot)
    }

    fn release(&mut self, slot: usize) {
        self.occupied[slot] = false;
    }

    fn in_flight(&self) -> usize {
        self.occupied.iter().filter(|b| **b).count()
    }
}

/// Wraps a `wgpu::Device` and bounds the number of [`CommandObject`]s outstanding at once.
pub struct CommandRecorder {
    device: wgpu::Device,
    slab: Arc<Mutex<Slab>>,
}

impl CommandRecorder {
    /// `max_in_flight` bounds the number of command objects that may exist between
    /// `make_command_object` and their GPU completion callback firing. The teacher's
    /// default of 6 is carried over.
    pub fn new(device: wgpu::Device, max_in_flight: usize) -> Self {
        Self {
            device,
            slab: Arc::new(Mutex::new(Slab {
                occupied: vec![false; max_in_flight.max(1)],
            })),
        }
    }

    /// Number of command objects currently outstanding (recorded-but-not-yet-completed).
    pub fn in_flight(&self) -> usize {
        self.slab.lock().expect("command slab poisoned").in_flight()
    }

    /// Allocates a new command object, or returns `CommandObjectUnavailable` if the
    /// in-flight cap has been reached. Never blocks — a caller that wants blocking
    /// semantics can poll the device and retry.
    pub fn make_command_object(&self) -> Result<CommandObject, SortError> {
        let slot = {
            let mut slab = self.slab.lock().expect("command slab poisoned");
            slab.acquire().ok_or(SortError::CommandObjectUnavailable)?
        };
        log::debug!("command recorder: opened command object in slot {slot}");
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("splat sort command object"),
            });
        Ok(CommandObject {
            slot,
            slab: self.slab.clone(),
            encoder: Some(encoder),
            released: false,
        })
    }
}

/// A single recorded command stream. Encapsulates compute-pass encoding and, on `submit`,
/// hands ownership of the underlying `wgpu::CommandEncoder` to the queue.
pub struct CommandObject {
    slot: usize,
    slab: Arc<Mutex<Slab>>,
    encoder: Option<wgpu::CommandEncoder>,
    released: bool,
}

impl CommandObject {
    /// Opens a scoped compute pass. The pass borrows the encoder and must be dropped
    /// before the next `compute_pass` call — Rust's borrow checker enforces this instead
    /// of a runtime "pass not ended" check.
    pub fn compute_pass(&mut self, label: &str) -> wgpu::ComputePass<'_> {
        self.encoder
            .as_mut()
            .expect("command object already submitted")
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            })
    }

    /// Direct access to the underlying encoder, for operations `compute_pass` doesn't
    /// cover (buffer-to-buffer copies, `queue.write_buffer` staging, etc.).
    pub fn encoder_mut(&mut self) -> &mut wgpu::CommandEncoder {
        self.encoder
            .as_mut()
            .expect("command object already submitted")
    }

    /// Finishes recording and submits the command buffer. `callback` runs once the GPU
    /// has completed this submission; the command object's slot is released at that
    /// point, not at submission time, so the in-flight cap bounds outstanding GPU work
    /// rather than merely unsubmitted recordings.
    pub fn submit(
        mut self,
        queue: &wgpu::Queue,
        callback: impl FnOnce() + Send + 'static,
    ) -> wgpu::SubmissionIndex {
        let encoder = self
            .encoder
            .take()
            .expect("command object already submitted");
        let index = queue.submit(Some(encoder.finish()));

        self.released = true;
        let slab = self.slab.clone();
        let slot = self.slot;
        queue.on_submitted_work_done(move || {
            slab.lock().expect("command slab poisoned").release(slot);
            callback();
        });
        index
    }
}

impl Drop for CommandObject {
    fn drop(&mut self) {
        if !self.released {
            // Cancellation path: never submitted, release immediately.
            self.slab
                .lock()
                .expect("command slab poisoned")
                .release(self.slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Slab;

    #[test]
    fn slab_bounds_in_flight_count() {
        let mut slab = Slab {
            occupied: vec![false; 2],
        };
        let a = slab.acquire().unwrap();
        let b = slab.acquire().unwrap();
        assert_eq!(slab.in_flight(), 2);
        assert!(slab.acquire().is_none(), "slab should be at capacity");
        slab.release(a);
        assert_eq!(slab.in_flight(), 1);
        let c = slab.acquire().unwrap();
        assert_eq!(c, a, "freed slot should be reused");
        slab.release(b);
        slab.release(c);
        assert_eq!(slab.in_flight(), 0);
    }
}
