//! # Queue
//!
//! Pending tracks for one player, plus the `current` and `previous` slots.
//!
//! The queue has no internal locking. The owning [`Player`](crate::Player)
//! keeps it behind a mutex and is its only writer.

use bridge_traits::media::Track;
use rand::Rng;
use std::collections::VecDeque;

/// Ordered list of upcoming tracks.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: VecDeque<Track>,
    current: Option<Track>,
    previous: Option<Track>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track to the end of the queue.
    pub fn add(&mut self, track: Track) -> &mut Self {
        self.tracks.push_back(track);
        self
    }

    /// Remove and return the track at `index`, or `None` when out of range.
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        self.tracks.remove(index)
    }

    /// Drop every pending track and return them in order.
    ///
    /// `current` and `previous` are left alone.
    pub fn clear(&mut self) -> Vec<Track> {
        self.tracks.drain(..).collect()
    }

    /// Uniformly permute the pending tracks in place (Fisher-Yates).
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    /// [`shuffle`](Self::shuffle) with a caller-provided generator.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.tracks.len()).rev() {
            let j = rng.gen_range(0..=i);
            self.tracks.swap(i, j);
        }
    }

    /// Dequeue the head.
    pub fn shift(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    /// Put a track in front of the head.
    pub fn unshift(&mut self, track: Track) {
        self.tracks.push_front(track);
    }

    pub fn size(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn first(&self) -> Option<&Track> {
        self.tracks.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Replace the current track, returning the old one.
    pub fn set_current(&mut self, track: Option<Track>) -> Option<Track> {
        std::mem::replace(&mut self.current, track)
    }

    pub fn previous(&self) -> Option<&Track> {
        self.previous.as_ref()
    }

    pub fn set_previous(&mut self, track: Option<Track>) {
        self.previous = track;
    }

    pub fn take_previous(&mut self) -> Option<Track> {
        self.previous.take()
    }

    /// Move the head into `current`, dropping the old current.
    ///
    /// `previous` is left alone; only the host writes it. Returns the new
    /// current track; the queue is unchanged when empty.
    pub(crate) fn advance(&mut self) -> Option<Track> {
        let next = self.shift()?;
        self.set_current(Some(next.clone()));
        Some(next)
    }
}

impl Extend<Track> for Queue {
    fn extend<I: IntoIterator<Item = Track>>(&mut self, iter: I) {
        self.tracks.extend(iter);
    }
}
