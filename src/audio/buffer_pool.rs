// BufferPool - lock-free capture buffers with dual SPSC queues
//
// Sits between the real-time input callback and the thread that forwards
// captured audio into a session. Both queues are pre-filled at start so the
// callback never allocates.
//
// Architecture:
// - FILLED queue: input callback pushes full buffers, forwarder consumes
// - FREE queue: forwarder returns drained buffers, input callback recycles
//
// Buffer flow:
// 1. CaptureWriter pops a free buffer and accumulates callback frames into it
// 2. Once `buffer_size` mono samples are collected it pushes to FILLED
// 3. CaptureReader pops from FILLED, copies the samples out, and returns the
//    buffer to FREE

use rtrb::{Consumer, Producer};

use crate::error::AudioError;

pub const DEFAULT_BUFFER_COUNT: usize = 16;
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Pre-allocated mono sample buffer
pub type AudioBuffer = Vec<f32>;

/// Lock-free buffer pool using dual SPSC ring buffers
pub struct BufferPool;

impl BufferPool {
    /// Allocate `buffer_count` buffers of `buffer_size` samples and split the
    /// queues into the callback side and the forwarding side.
    ///
    /// # Errors
    /// `AudioError::StreamOpenFailed` when either size is 0.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        buffer_count: usize,
        buffer_size: usize,
    ) -> Result<(CaptureWriter, CaptureReader), AudioError> {
        if buffer_count == 0 || buffer_size == 0 {
            return Err(AudioError::StreamOpenFailed {
                reason: format!(
                    "buffer pool needs a non-zero size (count={}, size={})",
                    buffer_count, buffer_size
                ),
            });
        }

        let (mut free_producer, free_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (filled_producer, filled_consumer) = rtrb::RingBuffer::new(buffer_count);

        for _ in 0..buffer_count {
            free_producer
                .push(Vec::with_capacity(buffer_size))
                .map_err(|_| AudioError::StreamOpenFailed {
                    reason: "buffer pool queue full during initialization".to_string(),
                })?;
        }

        Ok((
            CaptureWriter {
                filled: filled_producer,
                free: free_consumer,
                current: None,
                buffer_size,
                dropped_frames: 0,
            },
            CaptureReader {
                filled: filled_consumer,
                free: free_producer,
            },
        ))
    }
}

/// Input-callback side: accumulates interleaved frames into mono buffers
pub struct CaptureWriter {
    filled: Producer<AudioBuffer>,
    free: Consumer<AudioBuffer>,
    current: Option<AudioBuffer>,
    buffer_size: usize,
    dropped_frames: u64,
}

impl CaptureWriter {
    /// Mix interleaved `data` down to mono and queue every completed buffer.
    ///
    /// Never blocks or allocates; frames are dropped when the forwarder falls
    /// behind and no free buffer is available.
    pub fn write_interleaved(&mut self, data: &[f32], channels: usize) {
        let channels = channels.max(1);
        for frame in data.chunks(channels) {
            let sample = frame.iter().sum::<f32>() / channels as f32;
            self.push_sample(sample);
        }
    }

    fn push_sample(&mut self, sample: f32) {
        if self.current.is_none() {
            match self.free.pop() {
                Ok(mut buffer) => {
                    buffer.clear();
                    self.current = Some(buffer);
                }
                Err(_) => {
                    self.dropped_frames += 1;
                    return;
                }
            }
        }

        let Some(buffer) = self.current.as_mut() else {
            return;
        };
        buffer.push(sample);

        if buffer.len() >= self.buffer_size {
            if let Some(full) = self.current.take() {
                if let Err(rtrb::PushError::Full(_)) = self.filled.push(full) {
                    self.dropped_frames += self.buffer_size as u64;
                }
            }
        }
    }

    /// Frames discarded because the pool was exhausted
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }
}

/// Forwarding side: drains full buffers and recycles them
pub struct CaptureReader {
    filled: Consumer<AudioBuffer>,
    free: Producer<AudioBuffer>,
}

impl CaptureReader {
    /// Copy out the next full buffer, returning its storage to the pool
    pub fn pop(&mut self) -> Option<Vec<f32>> {
        let buffer = self.filled.pop().ok()?;
        let samples = buffer.clone();
        // Free queue has room for every buffer, so this only fails if the
        // writer side was dropped
        let _ = self.free.push(buffer);
        Some(samples)
    }

    /// Number of full buffers waiting
    pub fn pending(&self) -> usize {
        self.filled.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(BufferPool::new(0, 1024).is_err());
        assert!(BufferPool::new(16, 0).is_err());
    }

    #[test]
    fn test_buffers_complete_at_buffer_size() {
        let (mut writer, mut reader) = BufferPool::new(4, 8).unwrap();

        writer.write_interleaved(&[0.5; 5], 1);
        assert!(reader.pop().is_none());

        writer.write_interleaved(&[0.5; 5], 1);
        let buffer = reader.pop().expect("one full buffer");
        assert_eq!(buffer.len(), 8);
        assert_eq!(reader.pending(), 0);
    }

    #[test]
    fn test_stereo_is_mixed_to_mono() {
        let (mut writer, mut reader) = BufferPool::new(2, 4).unwrap();
        writer.write_interleaved(&[1.0, 0.0, 1.0, 0.0, -1.0, -1.0, 0.2, 0.4], 2);

        let buffer = reader.pop().unwrap();
        assert_eq!(buffer, vec![0.5, 0.5, -1.0, 0.3]);
    }

    #[test]
    fn test_buffers_circulate() {
        let (mut writer, mut reader) = BufferPool::new(2, 4).unwrap();

        for round in 0..10 {
            writer.write_interleaved(&[round as f32; 4], 1);
            let buffer = reader.pop().unwrap();
            assert_eq!(buffer[0], round as f32);
        }
        assert_eq!(writer.dropped_frames(), 0);
    }

    #[test]
    fn test_exhausted_pool_drops_frames() {
        let (mut writer, mut reader) = BufferPool::new(2, 4).unwrap();

        // Fill both buffers without draining, then overflow
        writer.write_interleaved(&[0.1; 8], 1);
        writer.write_interleaved(&[0.1; 3], 1);
        assert_eq!(writer.dropped_frames(), 3);

        assert_eq!(reader.pending(), 2);
        assert!(reader.pop().is_some());
        writer.write_interleaved(&[0.1; 4], 1);
        assert_eq!(reader.pending(), 2);
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CaptureWriter>();
        assert_send::<CaptureReader>();
    }
}
