//! Non-blocking GPU-to-CPU readback.
//!
//! One staging buffer per consumer, driven as an explicit state machine
//! (Idle -> Requested -> Mapped -> Read) instead of a callback tree. The
//! host polls; it never blocks on the GPU at runtime.

use std::sync::mpsc::{Receiver, TryRecvError};

use wgpu::{Buffer, BufferAsyncError, CommandEncoder, Device};

enum MapState {
    Idle,
    Requested(Receiver<Result<(), BufferAsyncError>>),
}

pub struct AsyncSlot {
    staging: Buffer,
    size: u64,
    state: MapState,
}

impl AsyncSlot {
    pub fn new(device: &Device, label: &str, size: u64) -> Self {
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            staging,
            size,
            state: MapState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, MapState::Idle)
    }

    /// Record a copy into the staging buffer. Only legal while idle; the
    /// caller pairs this with `request_map` after submitting the encoder.
    pub fn encode_copy(&self, encoder: &mut CommandEncoder, source: &Buffer) {
        debug_assert!(self.is_idle());
        encoder.copy_buffer_to_buffer(source, 0, &self.staging, 0, self.size);
    }

    /// Ask for the map after the copy has been submitted.
    pub fn request_map(&mut self) {
        debug_assert!(self.is_idle());
        let (tx, rx) = std::sync::mpsc::channel();
        self.staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.state = MapState::Requested(rx);
    }

    /// Poll for completion. Returns the staged bytes once, then goes back to
    /// idle; returns None while the map is still in flight.
    pub fn try_read(&mut self, device: &Device) -> Option<Vec<u8>> {
        let MapState::Requested(rx) = &self.state else {
            return None;
        };
        device.poll(wgpu::Maintain::Poll);
        match rx.try_recv() {
            Ok(Ok(())) => {
                let bytes = {
                    let view = self.staging.slice(..).get_mapped_range();
                    view.to_vec()
                };
                self.staging.unmap();
                self.state = MapState::Idle;
                Some(bytes)
            }
            Ok(Err(e)) => {
                log::warn!("staging map failed: {e}");
                self.state = MapState::Idle;
                None
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.state = MapState::Idle;
                None
            }
        }
    }
}
