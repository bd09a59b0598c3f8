//! Time-range membership and window resolution.
//!
//! All filtering happens in absolute rosbag nanoseconds. Windows given as
//! offsets from the bag start, or as epoch seconds, are resolved to
//! nanoseconds once, up front, and the hot path only ever compares `u64`s.

use std::str::FromStr;

use crate::error::{Error, Result};

const NS_PER_S: f64 = 1e9;

/// A resolved, inclusive time window in absolute rosbag nanoseconds.
/// Either bound may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_ns: Option<u64>,
    pub end_ns: Option<u64>,
}

impl TimeWindow {
    pub const UNBOUNDED: TimeWindow = TimeWindow {
        start_ns: None,
        end_ns: None,
    };

    /// Window from optional epoch-second bounds (the image extraction CLI
    /// takes absolute seconds, like the original tooling).
    pub fn from_epoch_seconds(start_s: Option<f64>, end_s: Option<f64>) -> TimeWindow {
        TimeWindow {
            start_ns: start_s.map(|s| (s * NS_PER_S).round() as u64),
            end_ns: end_s.map(|s| (s * NS_PER_S).round() as u64),
        }
    }

    /// Returns `(within_range, past_end)` for a record timestamp. Bounds are
    /// inclusive; `past_end` is only ever true when an end bound exists and
    /// `t_ns` lies strictly beyond it.
    pub fn contains(&self, t_ns: u64) -> (bool, bool) {
        let after_start = self.start_ns.is_none_or(|s| t_ns >= s);
        let before_end = self.end_ns.is_none_or(|e| t_ns <= e);
        let past_end = self.end_ns.is_some_and(|e| t_ns > e);
        (after_start && before_end, past_end)
    }
}

/// Coordinate system of the clip window bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampMode {
    /// Bounds are absolute rosbag nanoseconds.
    RosbagNs,
    /// Bounds are seconds from the first message in the bag.
    OffsetS,
}

impl FromStr for TimestampMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rosbag_ns" => Ok(TimestampMode::RosbagNs),
            "offset_s" => Ok(TimestampMode::OffsetS),
            other => Err(Error::InvalidTimestampMode(other.to_string())),
        }
    }
}

impl TimestampMode {
    /// Resolve raw CLI bounds into an absolute-nanosecond window.
    pub fn resolve_window(
        self,
        start: Option<f64>,
        end: Option<f64>,
        bag_start_ns: u64,
    ) -> TimeWindow {
        let to_ns = |t: f64| match self {
            TimestampMode::RosbagNs => t.round() as u64,
            TimestampMode::OffsetS => offset_s_to_rosbag_ns(t, bag_start_ns),
        };
        TimeWindow {
            start_ns: start.map(to_ns),
            end_ns: end.map(to_ns),
        }
    }
}

/// Convert an offset in seconds from the bag start into absolute nanoseconds.
pub fn offset_s_to_rosbag_ns(offset_s: f64, first_rosbag_time_ns: u64) -> u64 {
    if offset_s.is_sign_negative() {
        first_rosbag_time_ns.saturating_sub((-offset_s * NS_PER_S).round() as u64)
    } else {
        first_rosbag_time_ns + (offset_s * NS_PER_S).round() as u64
    }
}

/// Fraction of the bag duration covered by the window, clamped to [0, 1].
/// Used only to size progress estimates. Returns `None` when the bag has no
/// positive duration.
pub fn filter_fraction(
    start_s: Option<f64>,
    end_s: Option<f64>,
    bag_start_s: f64,
    bag_end_s: f64,
) -> Option<f64> {
    let duration = bag_end_s - bag_start_s;
    if duration <= 0.0 {
        return None;
    }
    let covered = match (start_s, end_s) {
        (Some(s), Some(e)) => e - s,
        (Some(s), None) => bag_end_s - s,
        (None, Some(e)) => e - bag_start_s,
        (None, None) => return Some(1.0),
    };
    Some((covered / duration).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_range_both_bounds() {
        let w = TimeWindow {
            start_ns: Some(10),
            end_ns: Some(15),
        };
        assert_eq!(w.contains(9), (false, false));
        assert_eq!(w.contains(10), (true, false));
        assert_eq!(w.contains(12), (true, false));
        assert_eq!(w.contains(15), (true, false));
        assert_eq!(w.contains(16), (false, true));
    }

    #[test]
    fn within_range_single_bounds() {
        let start_only = TimeWindow {
            start_ns: Some(10),
            end_ns: None,
        };
        assert_eq!(start_only.contains(9), (false, false));
        assert_eq!(start_only.contains(u64::MAX), (true, false));

        let end_only = TimeWindow {
            start_ns: None,
            end_ns: Some(15),
        };
        assert_eq!(end_only.contains(0), (true, false));
        assert_eq!(end_only.contains(16), (false, true));

        assert_eq!(TimeWindow::UNBOUNDED.contains(42), (true, false));
    }

    #[test]
    fn offset_resolution() {
        let first = 1_649_764_528_071_146_477u64;
        assert_eq!(offset_s_to_rosbag_ns(0.0, first), first);
        assert_eq!(offset_s_to_rosbag_ns(10.0, first), first + 10_000_000_000);
    }

    #[test]
    fn resolve_window_modes() {
        let first = 1_000_000_000u64;
        let w = TimestampMode::OffsetS.resolve_window(Some(0.0), Some(0.1), first);
        assert_eq!(w.start_ns, Some(first));
        assert_eq!(w.end_ns, Some(first + 100_000_000));

        let w = TimestampMode::RosbagNs.resolve_window(Some(10.0), None, first);
        assert_eq!(w.start_ns, Some(10));
        assert_eq!(w.end_ns, None);
    }

    #[test]
    fn timestamp_mode_parsing() {
        assert_eq!(
            "rosbag_ns".parse::<TimestampMode>().unwrap(),
            TimestampMode::RosbagNs
        );
        assert_eq!(
            "offset_s".parse::<TimestampMode>().unwrap(),
            TimestampMode::OffsetS
        );
        assert!(matches!(
            "weird_type".parse::<TimestampMode>(),
            Err(Error::InvalidTimestampMode(_))
        ));
    }

    #[test]
    fn fraction_of_duration() {
        assert_eq!(filter_fraction(None, None, 0.0, 10.0), Some(1.0));
        assert_eq!(filter_fraction(Some(2.0), Some(7.0), 0.0, 10.0), Some(0.5));
        assert_eq!(filter_fraction(Some(5.0), None, 0.0, 10.0), Some(0.5));
        assert_eq!(filter_fraction(None, Some(2.5), 0.0, 10.0), Some(0.25));
        // inverted bounds clamp instead of going negative
        assert_eq!(filter_fraction(Some(8.0), Some(2.0), 0.0, 10.0), Some(0.0));
        assert_eq!(filter_fraction(None, None, 10.0, 10.0), None);
    }
}
