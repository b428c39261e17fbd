use serde::{Deserialize, Serialize};

/// Fixed-capacity ring of samples for one channel. Only the producer writes
/// into it, and only while holding the channel's lock.
#[derive(Debug, Clone)]
pub(crate) struct ChannelBuffer {
    data: Vec<f32>,
    write_pos: usize,
    filled: usize,
    written: u64,
}

impl ChannelBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            write_pos: 0,
            filled: 0,
            written: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    /// Appends samples, overwriting the oldest ones once full. Never allocates.
    pub(crate) fn push_slice(&mut self, samples: &[f32]) {
        let capacity = self.data.len();
        // Only the newest `capacity` samples can survive the write.
        let skipped = samples.len().saturating_sub(capacity);
        let mut remaining = &samples[skipped..];
        self.advance_position(skipped);

        while !remaining.is_empty() {
            let run = remaining.len().min(capacity - self.write_pos);
            self.data[self.write_pos..self.write_pos + run].copy_from_slice(&remaining[..run]);
            remaining = &remaining[run..];
            self.advance_position(run);
        }
    }

    pub(crate) fn push_silence(&mut self, count: usize) {
        let capacity = self.data.len();
        let skipped = count.saturating_sub(capacity);
        self.advance_position(skipped);
        let mut remaining = count - skipped;
        while remaining > 0 {
            let run = remaining.min(capacity - self.write_pos);
            self.data[self.write_pos..self.write_pos + run].fill(0.0);
            remaining -= run;
            self.advance_position(run);
        }
    }

    fn advance_position(&mut self, count: usize) {
        let capacity = self.data.len();
        self.write_pos = (self.write_pos + count % capacity) % capacity;
        self.filled = (self.filled + count).min(capacity);
        self.written += count as u64;
    }

    /// The stored samples as (older, newer) slices around the wrap point.
    fn sections(&self) -> (&[f32], &[f32]) {
        if self.filled < self.data.len() {
            (&self.data[..self.filled], &[])
        } else {
            (&self.data[self.write_pos..], &self.data[..self.write_pos])
        }
    }

    pub(crate) fn copy_into(&self, out: &mut ChannelSnapshot) {
        let (older, newer) = self.sections();
        out.samples.clear();
        out.samples.extend_from_slice(older);
        out.samples.extend_from_slice(newer);
        out.split = older.len();
        out.window_start = Some(self.written - self.filled as u64);
    }

    /// Moves the newest samples into `storage` and makes it the new ring,
    /// handing back the old allocation so it can be freed outside the lock.
    pub(crate) fn replace_storage(&mut self, mut storage: Vec<f32>) -> Vec<f32> {
        let capacity = storage.len().max(1);
        storage.resize(capacity, 0.0);

        let keep = self.filled.min(capacity);
        let (older, newer) = self.sections();
        let mut cursor = 0;
        let skip = self.filled - keep;
        for &sample in older.iter().chain(newer.iter()).skip(skip) {
            storage[cursor] = sample;
            cursor += 1;
        }

        let old = std::mem::replace(&mut self.data, storage);
        self.filled = keep;
        self.write_pos = keep % capacity;
        old
    }
}

/// One channel of a [`Snapshot`], stored oldest sample first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    samples: Vec<f32>,
    split: usize,
    window_start: Option<u64>,
}

impl ChannelSnapshot {
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Index where the ring wrapped: `samples[..split]` is the older section,
    /// `samples[split..]` the newer one.
    pub fn split(&self) -> usize {
        self.split
    }

    /// Absolute stream position of the oldest sample in this channel, or
    /// `None` for data that did not come from a stream.
    pub fn window_start(&self) -> Option<u64> {
        self.window_start
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.split = 0;
        self.window_start = None;
    }
}

/// Owned copy of every channel for one frame's processing.
///
/// A snapshot taken in synced mode always has equal-length channels that
/// start at the same stream position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    channels: Vec<ChannelSnapshot>,
}

impl Snapshot {
    /// Creates a snapshot directly from channel data, mainly for offline use
    /// and tests. The first `split` samples of each channel form the older
    /// section. The snapshot has no stream position, so consumers that track
    /// new samples treat all of it as new.
    pub fn from_channels(channels: &[&[f32]], split: usize) -> Self {
        let channels = channels
            .iter()
            .map(|samples| ChannelSnapshot {
                samples: samples.to_vec(),
                split: split.min(samples.len()),
                window_start: None,
            })
            .collect();
        Self { channels }
    }

    pub fn stereo(left: &[f32], right: &[f32]) -> Self {
        Self::from_channels(&[left, right], left.len())
    }

    pub(crate) fn ensure_channels(&mut self, count: usize) -> &mut [ChannelSnapshot] {
        self.channels.resize_with(count, ChannelSnapshot::default);
        &mut self.channels
    }

    pub(crate) fn clear(&mut self) {
        self.channels.iter_mut().for_each(ChannelSnapshot::clear);
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelSnapshot> {
        self.channels.get(index)
    }

    /// Number of sample frames usable as a stereo pair.
    pub fn len(&self) -> usize {
        match self.channels.as_slice() {
            [] => 0,
            [only] => only.samples.len(),
            [left, right, ..] => left.samples.len().min(right.samples.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Left channel samples, truncated to [`Snapshot::len`].
    pub fn left(&self) -> &[f32] {
        self.channel_samples(0)
    }

    /// Right channel samples. A mono snapshot mirrors the left channel.
    pub fn right(&self) -> &[f32] {
        if self.channels.len() > 1 {
            self.channel_samples(1)
        } else {
            self.channel_samples(0)
        }
    }

    fn channel_samples(&self, index: usize) -> &[f32] {
        let len = self.len();
        self.channels
            .get(index)
            .map(|channel| &channel.samples[..len])
            .unwrap_or(&[])
    }

    /// Older and newer sections of a channel around the ring wrap point.
    pub fn sections(&self, index: usize) -> (&[f32], &[f32]) {
        match self.channels.get(index) {
            Some(channel) => channel.samples.split_at(channel.split),
            None => (&[], &[]),
        }
    }

    /// Wrap point of the stereo pair, clamped to [`Snapshot::len`].
    pub fn split(&self) -> usize {
        self.channels
            .first()
            .map(|channel| channel.split.min(self.len()))
            .unwrap_or(0)
    }

    pub fn window_start(&self, index: usize) -> Option<u64> {
        self.channels.get(index).and_then(|channel| channel.window_start)
    }

    /// True when every channel covers the same window of the stream.
    pub fn is_consistent(&self) -> bool {
        let mut channels = self.channels.iter();
        let Some(first) = channels.next() else {
            return true;
        };
        channels.all(|channel| {
            channel.samples.len() == first.samples.len()
                && channel.window_start == first.window_start
        })
    }
}
