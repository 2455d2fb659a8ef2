// Local maxima of the energy envelope
//
// A local maximum is strictly higher than its left neighbour and strictly
// higher than the first differing value to its right, so a flat plateau
// reports its first point. Endpoints are never maxima.

use serde::{Deserialize, Serialize};

use super::envelope::EnergyEnvelope;

/// Local maximum of the envelope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Index into the envelope points
    pub index: usize,
    pub time: f64,
    pub rms: f64,
    /// Height above the higher of the two bases reachable without climbing
    /// past a taller point
    pub prominence: f64,
}

/// Find every local maximum of the envelope, in time order
pub fn find_local_maxima(envelope: &EnergyEnvelope) -> Vec<Peak> {
    let points = envelope.points();
    let n = points.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let rms: Vec<f64> = envelope.rms_values().collect();
    let mut i = 1;
    while i < n - 1 {
        if rms[i - 1] < rms[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && rms[ahead] == rms[i] {
                ahead += 1;
            }
            if rms[ahead] < rms[i] {
                peaks.push(Peak {
                    index: i,
                    time: points[i].time,
                    rms: rms[i],
                    prominence: prominence(&rms, i),
                });
            }
            i = ahead;
        } else {
            i += 1;
        }
    }

    peaks
}

fn prominence(rms: &[f64], peak: usize) -> f64 {
    let height = rms[peak];

    let mut left_min = height;
    for &value in rms[..peak].iter().rev() {
        if value > height {
            break;
        }
        left_min = left_min.min(value);
    }

    let mut right_min = height;
    for &value in &rms[peak + 1..] {
        if value > height {
            break;
        }
        right_min = right_min.min(value);
    }

    height - left_min.max(right_min)
}

/// Rank peaks by height and drop any within `min_separation` of a kept one
///
/// Peaks are visited by rms descending, earliest first on ties; a peak is
/// kept unless an already kept peak lies strictly closer than
/// `min_separation`. The result is in rank order.
pub fn suppress_by_distance(peaks: &[Peak], min_separation: f64) -> Vec<Peak> {
    let mut ranked = peaks.to_vec();
    ranked.sort_by(|a, b| b.rms.total_cmp(&a.rms).then(a.time.total_cmp(&b.time)));

    let mut kept = Vec::with_capacity(ranked.len());
    // Times of kept peaks, ascending, for neighbour lookup
    let mut kept_times: Vec<f64> = Vec::new();

    for peak in ranked {
        let pos = kept_times.partition_point(|&t| t < peak.time);
        let too_close_right = kept_times
            .get(pos)
            .is_some_and(|&t| t - peak.time < min_separation);
        let too_close_left = pos > 0 && peak.time - kept_times[pos - 1] < min_separation;
        if too_close_left || too_close_right {
            continue;
        }
        kept_times.insert(pos, peak.time);
        kept.push(peak);
    }

    kept
}
