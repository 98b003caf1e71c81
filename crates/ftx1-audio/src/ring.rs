//! Jitter-absorbing byte ring buffer for the TX audio path.
//!
//! Writes never fail: on overflow the oldest bytes are discarded and the
//! overrun counter advances. Reads block (with a deadline) until the
//! requested amount is available; an empty-handed deadline advances the
//! underrun counter, which the playback task answers with a frame of
//! silence.
//!
//! Startup gating: playback holds off until the buffer first reaches its
//! target fill, so a network burst at connect time does not immediately
//! drain into underruns.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

struct RingState {
    buf: Box<[u8]>,
    /// Next byte to read.
    read_pos: usize,
    /// Number of readable bytes behind `read_pos`.
    len: usize,
    reached_target: bool,
    underrun_count: u64,
    overrun_count: u64,
}

/// Bounded byte FIFO with target-fill gating and under/overrun counters.
pub struct AudioRingBuffer {
    state: Mutex<RingState>,
    data_ready: Condvar,
    capacity: usize,
    target_fill: usize,
}

impl AudioRingBuffer {
    /// Create a ring sized for `buffer_ms` of audio, gated at
    /// `target_latency_ms`. Capacity is rounded up to a power of two.
    pub fn for_duration(
        bytes_per_second: usize,
        buffer_ms: u32,
        target_latency_ms: u32,
    ) -> AudioRingBuffer {
        let capacity = (bytes_per_second * buffer_ms as usize / 1000).next_power_of_two();
        let target_fill = bytes_per_second * target_latency_ms as usize / 1000;
        AudioRingBuffer::new(capacity, target_fill.min(capacity))
    }

    /// Create a ring with an explicit capacity (rounded up to a power of
    /// two) and target fill level in bytes.
    pub fn new(capacity: usize, target_fill: usize) -> AudioRingBuffer {
        let capacity = capacity.next_power_of_two().max(2);
        AudioRingBuffer {
            state: Mutex::new(RingState {
                buf: vec![0u8; capacity].into_boxed_slice(),
                read_pos: 0,
                len: 0,
                reached_target: false,
                underrun_count: 0,
                overrun_count: 0,
            }),
            data_ready: Condvar::new(),
            capacity,
            target_fill,
        }
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Target fill level in bytes.
    pub fn target_fill(&self) -> usize {
        self.target_fill
    }

    /// Bytes currently readable.
    pub fn available(&self) -> usize {
        self.state.lock().unwrap().len
    }

    /// Whether the fill level has reached the target at least once since
    /// the last [`clear`](AudioRingBuffer::clear).
    pub fn has_reached_target(&self) -> bool {
        self.state.lock().unwrap().reached_target
    }

    /// Number of reads that came up empty at their deadline.
    pub fn underrun_count(&self) -> u64 {
        self.state.lock().unwrap().underrun_count
    }

    /// Number of writes that had to discard old data.
    pub fn overrun_count(&self) -> u64 {
        self.state.lock().unwrap().overrun_count
    }

    /// Fill level as a percentage of capacity.
    pub fn fill_percent(&self) -> u32 {
        let state = self.state.lock().unwrap();
        (state.len * 100 / self.capacity) as u32
    }

    /// Buffered audio expressed in milliseconds at `bytes_per_second`.
    pub fn level_ms(&self, bytes_per_second: usize) -> u64 {
        if bytes_per_second == 0 {
            return 0;
        }
        let state = self.state.lock().unwrap();
        (state.len * 1000 / bytes_per_second) as u64
    }

    /// Append bytes; always succeeds. On overflow the oldest bytes are
    /// discarded first and the overrun counter advances.
    pub fn write(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap();

        // A write larger than the ring keeps only its tail.
        let data = if data.len() > self.capacity {
            state.overrun_count += 1;
            &data[data.len() - self.capacity..]
        } else {
            data
        };

        let overflow = (state.len + data.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            state.read_pos = (state.read_pos + overflow) & (self.capacity - 1);
            state.len -= overflow;
            state.overrun_count += 1;
        }

        let write_pos = (state.read_pos + state.len) & (self.capacity - 1);
        let first = (self.capacity - write_pos).min(data.len());
        state.buf[write_pos..write_pos + first].copy_from_slice(&data[..first]);
        if first < data.len() {
            let rest = data.len() - first;
            state.buf[..rest].copy_from_slice(&data[first..]);
        }
        state.len += data.len();

        if state.len >= self.target_fill {
            state.reached_target = true;
        }

        drop(state);
        self.data_ready.notify_all();
    }

    /// Read up to `out.len()` bytes, waiting up to `timeout` for the full
    /// amount. Returns the number of bytes copied; `0` means the deadline
    /// passed with nothing buffered (an underrun).
    pub fn read(&self, out: &mut [u8], timeout: Duration) -> usize {
        if out.is_empty() {
            return 0;
        }

        let mut state = self.state.lock().unwrap();
        let deadline = std::time::Instant::now() + timeout;

        while state.len < out.len() {
            let now = std::time::Instant::now();
            if now >= deadline {
                break;
            }
            let (next, timed_out) = self
                .data_ready
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = next;
            if timed_out.timed_out() {
                break;
            }
        }

        let n = state.len.min(out.len());
        if n == 0 {
            state.underrun_count += 1;
            return 0;
        }

        let first = (self.capacity - state.read_pos).min(n);
        out[..first].copy_from_slice(&state.buf[state.read_pos..state.read_pos + first]);
        if first < n {
            out[first..n].copy_from_slice(&state.buf[..n - first]);
        }
        state.read_pos = (state.read_pos + n) & (self.capacity - 1);
        state.len -= n;
        n
    }

    /// Block until the fill level first reaches the target, or the timeout
    /// expires. Returns whether the target was reached.
    pub fn wait_for_target(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock().unwrap();
        let deadline = std::time::Instant::now() + timeout;

        while !state.reached_target {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, timed_out) = self
                .data_ready
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = next;
            if timed_out.timed_out() && !state.reached_target {
                return false;
            }
        }
        true
    }

    /// Drop all buffered data and reset the target gate. Counters are
    /// preserved (they are monotonic for the life of the buffer).
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.read_pos = 0;
        state.len = 0;
        state.reached_target = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn capacity_rounds_to_power_of_two() {
        let ring = AudioRingBuffer::new(1000, 100);
        assert_eq!(ring.capacity(), 1024);
    }

    #[test]
    fn for_duration_sizing() {
        // 48 kHz x 2 bytes x mono = 96000 B/s; 500 ms = 48000 B -> 65536.
        let ring = AudioRingBuffer::for_duration(96_000, 500, 100);
        assert_eq!(ring.capacity(), 65_536);
        assert_eq!(ring.target_fill(), 9_600);
    }

    #[test]
    fn write_then_read_round_trip() {
        let ring = AudioRingBuffer::new(64, 8);
        ring.write(&[1, 2, 3, 4]);
        assert_eq!(ring.available(), 4);

        let mut out = [0u8; 4];
        let n = ring.read(&mut out, Duration::from_millis(10));
        assert_eq!(n, 4);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn read_wraps_around_the_ring() {
        let ring = AudioRingBuffer::new(8, 2);
        let mut out = [0u8; 6];

        // Advance the cursors near the end, then wrap.
        ring.write(&[0; 6]);
        assert_eq!(ring.read(&mut out, Duration::from_millis(5)), 6);
        ring.write(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(ring.read(&mut out, Duration::from_millis(5)), 6);
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn overflow_drops_oldest_and_counts() {
        let ring = AudioRingBuffer::new(8, 2);
        ring.write(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ring.overrun_count(), 0);

        ring.write(&[9, 10]);
        assert_eq!(ring.overrun_count(), 1);
        assert_eq!(ring.available(), 8);

        let mut out = [0u8; 8];
        assert_eq!(ring.read(&mut out, Duration::from_millis(5)), 8);
        assert_eq!(out, [3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn oversized_write_keeps_tail() {
        let ring = AudioRingBuffer::new(4, 2);
        let data: Vec<u8> = (0..10).collect();
        ring.write(&data);
        assert!(ring.overrun_count() >= 1);

        let mut out = [0u8; 4];
        assert_eq!(ring.read(&mut out, Duration::from_millis(5)), 4);
        assert_eq!(out, [6, 7, 8, 9]);
    }

    #[test]
    fn empty_read_counts_underrun() {
        let ring = AudioRingBuffer::new(64, 8);
        let mut out = [0u8; 4];
        assert_eq!(ring.read(&mut out, Duration::from_millis(5)), 0);
        assert_eq!(ring.underrun_count(), 1);
        assert_eq!(ring.read(&mut out, Duration::from_millis(5)), 0);
        assert_eq!(ring.underrun_count(), 2);
    }

    #[test]
    fn partial_read_at_deadline_is_not_underrun() {
        let ring = AudioRingBuffer::new(64, 8);
        ring.write(&[1, 2]);

        let mut out = [0u8; 4];
        let n = ring.read(&mut out, Duration::from_millis(5));
        assert_eq!(n, 2);
        assert_eq!(ring.underrun_count(), 0);
    }

    #[test]
    fn target_gating_latches() {
        let ring = AudioRingBuffer::new(64, 8);
        assert!(!ring.has_reached_target());

        ring.write(&[0; 4]);
        assert!(!ring.has_reached_target());

        ring.write(&[0; 4]);
        assert!(ring.has_reached_target());

        // Draining does not reset the latch.
        let mut out = [0u8; 8];
        ring.read(&mut out, Duration::from_millis(5));
        assert!(ring.has_reached_target());

        // Clearing does.
        ring.clear();
        assert!(!ring.has_reached_target());
    }

    #[test]
    fn counters_survive_clear() {
        let ring = AudioRingBuffer::new(4, 2);
        ring.write(&[0; 6]);
        let mut out = [0u8; 2];
        ring.read(&mut out, Duration::from_millis(1));
        ring.read(&mut out, Duration::from_millis(1));
        ring.read(&mut out, Duration::from_millis(1));
        let (under, over) = (ring.underrun_count(), ring.overrun_count());
        assert!(over >= 1);
        assert!(under >= 1);

        ring.clear();
        assert_eq!(ring.underrun_count(), under);
        assert_eq!(ring.overrun_count(), over);
    }

    #[test]
    fn blocked_read_wakes_on_write() {
        let ring = Arc::new(AudioRingBuffer::new(64, 8));
        let writer_ring = Arc::clone(&ring);

        let reader = std::thread::spawn(move || {
            let mut out = [0u8; 4];
            let n = ring.read(&mut out, Duration::from_secs(2));
            (n, out)
        });

        std::thread::sleep(Duration::from_millis(50));
        writer_ring.write(&[7, 8, 9, 10]);

        let (n, out) = reader.join().unwrap();
        assert_eq!(n, 4);
        assert_eq!(out, [7, 8, 9, 10]);
    }

    #[test]
    fn wait_for_target_blocks_until_filled() {
        let ring = Arc::new(AudioRingBuffer::new(64, 16));
        let writer_ring = Arc::clone(&ring);

        let waiter = std::thread::spawn(move || ring.wait_for_target(Duration::from_secs(2)));

        std::thread::sleep(Duration::from_millis(50));
        writer_ring.write(&[0; 16]);

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn wait_for_target_times_out() {
        let ring = AudioRingBuffer::new(64, 16);
        assert!(!ring.wait_for_target(Duration::from_millis(20)));
    }

    #[test]
    fn fill_metrics() {
        let ring = AudioRingBuffer::new(100, 10); // capacity rounds to 128
        ring.write(&[0; 64]);
        assert_eq!(ring.fill_percent(), 50);
        // 64 bytes at 1000 B/s = 64 ms.
        assert_eq!(ring.level_ms(1000), 64);
    }
}
