//! Shared multi-channel audio history.
//!
//! The audio callback appends into [`AudioStream`]; the render thread reads
//! it through a [`StreamReader`], which owns the freeze flag and the storage
//! snapshots are copied into.

mod snapshot;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use serde::{Deserialize, Serialize};

pub(crate) use snapshot::ChannelBuffer;
pub use snapshot::{ChannelSnapshot, Snapshot};

use crate::config::validate_history_ms;
use crate::{Result, VectorScopeError};

/// Upper bound on channels per stream; lets the producer lock every channel
/// without allocating.
pub const MAX_CHANNELS: usize = 8;

const NO_PENDING_CAPACITY: usize = 0;

/// How the render thread copies channel data out of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotMode {
    /// Hold every channel lock at once while copying. Channels are
    /// guaranteed to cover the same window.
    Synced,
    /// Copy each channel only if its lock is free right now. Never waits
    /// on the producer: a channel that is being written keeps its copy from
    /// the previous frame, so channels may cover skewed windows.
    Live,
}

/// Static description of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub sample_rate: f32,
    pub num_channels: usize,
    pub capacity: usize,
    pub samples_written: u64,
}

/// Multi-channel ring buffer shared between the audio and render threads.
#[derive(Debug)]
pub struct AudioStream {
    sample_rate: f32,
    channels: Vec<Mutex<ChannelBuffer>>,
    pending_capacity: AtomicUsize,
}

impl AudioStream {
    /// Creates a stream holding `capacity` samples per channel.
    pub fn new(num_channels: usize, sample_rate: f32, capacity: usize) -> Result<Self> {
        if num_channels == 0 || num_channels > MAX_CHANNELS {
            return Err(VectorScopeError::invalid_config(format!(
                "streams support 1 to {MAX_CHANNELS} channels, got {num_channels}"
            )));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(VectorScopeError::invalid_config(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        if capacity == 0 {
            return Err(VectorScopeError::invalid_config(
                "stream capacity must hold at least one sample",
            ));
        }

        let channels = (0..num_channels)
            .map(|_| Mutex::new(ChannelBuffer::with_capacity(capacity)))
            .collect();

        Ok(Self {
            sample_rate,
            channels,
            pending_capacity: AtomicUsize::new(NO_PENDING_CAPACITY),
        })
    }

    /// Creates a stream whose history covers `history_ms` milliseconds.
    pub fn with_history_ms(num_channels: usize, sample_rate: f32, history_ms: u32) -> Result<Self> {
        validate_history_ms(history_ms)?;
        Self::new(num_channels, sample_rate, ms_to_samples(sample_rate, history_ms))
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Appends one block of audio. Called from the audio callback.
    ///
    /// All channel locks are taken in index order before anything is written
    /// so a synced reader never observes a partially applied block. Input
    /// channels beyond the stream's count are ignored, missing ones are
    /// written as silence, and the shortest input slice bounds the block.
    /// Returns the number of samples written per channel.
    pub fn append_samples(&self, channel_data: &[&[f32]]) -> Result<usize> {
        let num_samples = channel_data.iter().map(|c| c.len()).min().unwrap_or(0);
        if num_samples == 0 {
            return Ok(0);
        }

        let mut guards = self.lock_all()?;
        for (index, guard) in guards.iter_mut().enumerate() {
            match channel_data.get(index) {
                Some(samples) => guard.push_slice(&samples[..num_samples]),
                None => guard.push_silence(num_samples),
            }
        }
        Ok(num_samples)
    }

    /// Total samples appended per channel since creation.
    pub fn samples_written(&self) -> Result<u64> {
        Ok(self.lock_channel(0)?.written())
    }

    /// True until the first block has been appended.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.samples_written()? == 0)
    }

    pub fn info(&self) -> Result<StreamInfo> {
        let channel = self.lock_channel(0)?;
        Ok(StreamInfo {
            sample_rate: self.sample_rate,
            num_channels: self.channels.len(),
            capacity: channel.capacity(),
            samples_written: channel.written(),
        })
    }

    pub fn capacity(&self) -> Result<usize> {
        Ok(self.lock_channel(0)?.capacity())
    }

    /// Queues a history resize. It is applied by the reader between frames,
    /// never while a snapshot is being copied. An invalid request is rejected
    /// and the current capacity stays in effect.
    pub fn request_capacity_ms(&self, history_ms: u32) -> Result<usize> {
        validate_history_ms(history_ms)?;
        let samples = ms_to_samples(self.sample_rate, history_ms);
        self.pending_capacity.store(samples, Ordering::Release);
        Ok(samples)
    }

    /// Applies a queued resize, keeping the newest samples of each channel.
    /// Storage is allocated and freed outside the channel locks.
    pub(crate) fn apply_pending_capacity(&self) -> Result<Option<usize>> {
        let capacity = self
            .pending_capacity
            .swap(NO_PENDING_CAPACITY, Ordering::AcqRel);
        if capacity == NO_PENDING_CAPACITY || capacity == self.capacity()? {
            return Ok(None);
        }

        let mut fresh: Vec<Vec<f32>> = (0..self.channels.len())
            .map(|_| vec![0.0; capacity])
            .collect();
        let mut retired = Vec::with_capacity(self.channels.len());
        {
            let mut guards = self.lock_all()?;
            for (guard, storage) in guards.iter_mut().zip(fresh.drain(..)) {
                retired.push(guard.replace_storage(storage));
            }
        }
        drop(retired);

        tracing::info!(capacity, "applied audio history resize");
        Ok(Some(capacity))
    }

    fn lock_channel(&self, index: usize) -> Result<MutexGuard<'_, ChannelBuffer>> {
        self.channels[index]
            .lock()
            .map_err(|_| VectorScopeError::Poisoned("audio channel buffer"))
    }

    /// `None` while another thread holds the channel.
    fn try_lock_channel(&self, index: usize) -> Result<Option<MutexGuard<'_, ChannelBuffer>>> {
        match self.channels[index].try_lock() {
            Ok(guard) => Ok(Some(guard)),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Poisoned(_)) => {
                Err(VectorScopeError::Poisoned("audio channel buffer"))
            }
        }
    }

    /// Locks every channel in ascending index order. Every multi-channel
    /// lock in this module goes through here, which rules out lock-order
    /// inversions between the producer and the reader.
    fn lock_all(&self) -> Result<ChannelGuards<'_>> {
        let mut guards = ChannelGuards {
            guards: std::array::from_fn(|_| None),
        };
        for (index, slot) in guards.guards.iter_mut().take(self.channels.len()).enumerate() {
            *slot = Some(self.lock_channel(index)?);
        }
        Ok(guards)
    }
}

/// Guards for all channels of a stream, held on the stack.
struct ChannelGuards<'a> {
    guards: [Option<MutexGuard<'a, ChannelBuffer>>; MAX_CHANNELS],
}

impl<'a> ChannelGuards<'a> {
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut MutexGuard<'a, ChannelBuffer>> + '_ {
        self.guards.iter_mut().map_while(Option::as_mut)
    }

    fn iter(&self) -> impl Iterator<Item = &MutexGuard<'a, ChannelBuffer>> + '_ {
        self.guards.iter().map_while(Option::as_ref)
    }
}

pub(crate) fn ms_to_samples(sample_rate: f32, ms: u32) -> usize {
    ((sample_rate as f64 * 0.001 * ms as f64).round() as usize).max(1)
}

/// Render-thread handle on an [`AudioStream`].
#[derive(Debug)]
pub struct StreamReader {
    stream: Arc<AudioStream>,
    snapshot: Snapshot,
    frozen: bool,
    has_frame: bool,
    stale_channels: usize,
}

impl StreamReader {
    pub fn new(stream: Arc<AudioStream>) -> Self {
        Self {
            stream,
            snapshot: Snapshot::default(),
            frozen: false,
            has_frame: false,
            stale_channels: 0,
        }
    }

    pub fn stream(&self) -> &Arc<AudioStream> {
        &self.stream
    }

    /// Holds the current snapshot; audio keeps accumulating unseen.
    pub fn freeze(&mut self) {
        if !self.frozen {
            tracing::info!("freezing vectorscope snapshot");
        }
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        if self.frozen {
            tracing::info!("resuming live vectorscope snapshots");
        }
        self.frozen = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Channels the last live snapshot could not refresh because the
    /// producer was writing them.
    pub fn stale_channels(&self) -> usize {
        self.stale_channels
    }

    /// The most recently acquired snapshot.
    pub fn last_snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Returns this frame's snapshot.
    ///
    /// While frozen the previously captured snapshot is returned without
    /// touching the stream. A stream that has never received audio yields an
    /// empty snapshot.
    pub fn acquire_snapshot(&mut self, mode: SnapshotMode) -> Result<&Snapshot> {
        if self.frozen && self.has_frame {
            return Ok(&self.snapshot);
        }

        self.stream.apply_pending_capacity()?;

        let channels = self.snapshot.ensure_channels(self.stream.num_channels());
        match mode {
            SnapshotMode::Synced => {
                let guards = self.stream.lock_all()?;
                for (guard, out) in guards.iter().zip(channels.iter_mut()) {
                    guard.copy_into(out);
                }
                self.stale_channels = 0;
            }
            SnapshotMode::Live => {
                let mut stale = 0;
                for (index, out) in channels.iter_mut().enumerate() {
                    match self.stream.try_lock_channel(index)? {
                        Some(guard) => guard.copy_into(out),
                        None => stale += 1,
                    }
                }
                if stale > 0 {
                    tracing::trace!(stale, "live snapshot reused contended channels");
                }
                self.stale_channels = stale;
            }
        }

        if self.snapshot.is_empty() {
            self.snapshot.clear();
        }
        self.has_frame = true;
        Ok(&self.snapshot)
    }
}
