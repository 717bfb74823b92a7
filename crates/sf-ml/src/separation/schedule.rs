//! Frame scheduling over a waveform of arbitrary length
//!
//! Frames start every `hop` samples. The final frame is the first one that
//! reaches the end of the waveform; it is zero-padded up to the frame length
//! and emission stops there, even when the next hop would still start inside
//! the waveform.

use super::config::SeparationConfig;
use crate::error::MlResult;

/// One analysis frame: samples `[start, end)` plus `pad` trailing zeros
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Ordinal of this frame in the schedule
    pub index: usize,
    /// First sample (inclusive)
    pub start: usize,
    /// Last sample (exclusive)
    pub end: usize,
    /// Zero samples appended to reach the frame length
    pub pad: usize,
}

impl FrameDescriptor {
    /// Number of real (unpadded) samples in the frame
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when the frame holds no real samples
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// True for the zero-padded tail frame
    pub fn is_padded(&self) -> bool {
        self.pad > 0
    }
}

/// Lazy, restartable sequence of [`FrameDescriptor`]s
#[derive(Debug, Clone)]
pub struct FrameSchedule {
    total: usize,
    frame_len: usize,
    hop: usize,
    next_start: usize,
    next_index: usize,
    done: bool,
}

impl FrameSchedule {
    /// Schedule `total` samples with an explicit frame length and hop
    pub fn new(total: usize, frame_len: usize, hop: usize) -> Self {
        debug_assert!(hop >= 1 && hop <= frame_len);
        Self {
            total,
            frame_len,
            hop,
            next_start: 0,
            next_index: 0,
            done: total == 0,
        }
    }

    /// Schedule `total` samples using a validated configuration
    pub fn for_config(total: usize, config: &SeparationConfig) -> MlResult<Self> {
        let hop = config.hop()?;
        Ok(Self::new(total, config.frame_len, hop))
    }

    /// Frame length in samples
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Stride between frame starts
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Total frames the full schedule emits
    pub fn frame_count(&self) -> usize {
        Self::count_frames(self.total, self.frame_len, self.hop)
    }

    fn count_frames(total: usize, frame_len: usize, hop: usize) -> usize {
        if total == 0 {
            0
        } else if total <= frame_len {
            1
        } else {
            (total - frame_len).div_ceil(hop) + 1
        }
    }
}

impl Iterator for FrameSchedule {
    type Item = FrameDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_start >= self.total {
            return None;
        }

        let start = self.next_start;
        let end = (start + self.frame_len).min(self.total);
        let pad = self.frame_len - (end - start);
        let index = self.next_index;

        self.next_start += self.hop;
        self.next_index += 1;
        self.done = end == self.total;

        Some(FrameDescriptor {
            index,
            start,
            end,
            pad,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done {
            0
        } else {
            Self::count_frames(self.total, self.frame_len, self.hop) - self.next_index
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameSchedule {}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(total: usize, frame_len: usize, hop: usize) -> Vec<(usize, usize, usize)> {
        FrameSchedule::new(total, frame_len, hop)
            .map(|f| (f.start, f.end, f.pad))
            .collect()
    }

    #[test]
    fn test_no_overlap_with_padded_tail() {
        assert_eq!(collect(10, 4, 4), vec![(0, 4, 0), (4, 8, 0), (8, 10, 2)]);
    }

    #[test]
    fn test_exact_multiple_has_no_padding() {
        assert_eq!(collect(8, 4, 4), vec![(0, 4, 0), (4, 8, 0)]);
    }

    #[test]
    fn test_stops_at_first_frame_reaching_end() {
        // Starts 0, 3 would be followed by 6 < 7, but frame at 3 already reaches 7
        assert_eq!(collect(7, 4, 3), vec![(0, 4, 0), (3, 7, 0)]);
    }

    #[test]
    fn test_short_waveform_single_padded_frame() {
        assert_eq!(collect(3, 8, 4), vec![(0, 3, 5)]);
    }

    #[test]
    fn test_empty_waveform() {
        let mut schedule = FrameSchedule::new(0, 4, 2);
        assert_eq!(schedule.len(), 0);
        assert!(schedule.next().is_none());
    }

    #[test]
    fn test_restartable_and_exact_size() {
        let schedule = FrameSchedule::new(100, 10, 5);
        let first: Vec<_> = schedule.clone().collect();
        let second: Vec<_> = schedule.clone().collect();
        assert_eq!(first, second);
        assert_eq!(schedule.len(), first.len());
        assert_eq!(schedule.frame_count(), 19);

        let mut partial = schedule;
        partial.next();
        assert_eq!(partial.len(), 18);
    }

    #[test]
    fn test_descriptor_invariants() {
        for total in 1..60 {
            for frame_len in 1..12 {
                for hop in 1..=frame_len {
                    let frames: Vec<_> = FrameSchedule::new(total, frame_len, hop).collect();
                    assert_eq!(frames.len(), FrameSchedule::count_frames(total, frame_len, hop));

                    let mut covered = 0;
                    for (i, f) in frames.iter().enumerate() {
                        assert_eq!(f.index, i);
                        assert_eq!(f.len() + f.pad, frame_len);
                        assert!(f.start <= covered, "gap before frame {}", i);
                        assert!(f.end <= total);
                        covered = covered.max(f.end);
                    }
                    assert_eq!(covered, total);
                    assert_eq!(frames.last().map(|f| f.end), Some(total));
                    assert!(frames.iter().filter(|f| f.is_padded()).count() <= 1);
                }
            }
        }
    }
}
