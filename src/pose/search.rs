//! Nearest-keyframe search
//!
//! Binary narrowing over sorted keyframe times. Exact ties resolve to the
//! earlier keyframe, and among keyframes sharing a time the first one wins,
//! so the result always equals a linear minimum-distance scan.

use super::keyframe::Keyframe;

/// Index of the entry whose time is nearest to `t`
///
/// `items` must be sorted by `time_of` and must not be empty.
pub fn nearest_by<T, F>(items: &[T], t: f64, time_of: F) -> usize
where
    F: Fn(&T) -> f64,
{
    debug_assert!(!items.is_empty(), "nearest-keyframe search on an empty list");
    if items.len() <= 1 {
        return 0;
    }

    let mut lo = 0;
    let mut hi = items.len() - 1;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if t <= time_of(&items[mid]) {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    let pick = if time_of(&items[hi]) - t < t - time_of(&items[lo]) {
        hi
    } else {
        lo
    };

    let target = time_of(&items[pick]);
    let mut index = pick;
    while index > 0 && time_of(&items[index - 1]) == target {
        index -= 1;
    }
    index
}

/// Index of the time nearest to `t` in a sorted, non-empty slice
pub fn nearest_time_index(times: &[f64], t: f64) -> usize {
    nearest_by(times, t, |time| *time)
}

/// Index of the keyframe nearest to `t`
pub fn nearest_keyframe(keyframes: &[Keyframe], t: f64) -> usize {
    nearest_by(keyframes, t, |kf| kf.time)
}
