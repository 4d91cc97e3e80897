//! Fixed-length encoding of peak lists

use super::finder::Peak;

/// Channels per encoded fiber: weight, then direction x, y, z
pub const FIBER_STRIDE: usize = 4;

/// An ordered list of at most `comps` fibers
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fibers {
    comps: usize,
    peaks: Vec<Peak>,
}

impl Fibers {
    /// Keeps the first `comps` peaks
    pub fn new(comps: usize, mut peaks: Vec<Peak>) -> Self {
        peaks.truncate(comps);
        Self { comps, peaks }
    }

    /// Encoded length for `comps` fibers
    #[inline]
    pub fn dim(comps: usize) -> usize {
        comps * FIBER_STRIDE
    }

    pub fn comps(&self) -> usize {
        self.comps
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Write into `out` (length `dim(comps)`); unused slots are zero
    ///
    /// Directions are flipped into the z ≥ 0 hemisphere so equal axes
    /// always encode the same way.
    pub fn encode(&self, out: &mut [f64]) {
        out.fill(0.0);
        for (slot, peak) in out.chunks_exact_mut(FIBER_STRIDE).zip(&self.peaks) {
            let d = canonical(peak.dir);
            slot[0] = peak.weight;
            slot[1..].copy_from_slice(&d);
        }
    }

    /// Read fibers back; slots with zero weight and zero direction are empty
    pub fn decode(encoded: &[f64]) -> Self {
        let comps = encoded.len() / FIBER_STRIDE;
        let peaks = encoded.chunks_exact(FIBER_STRIDE)
            .filter(|s| s.iter().any(|&v| v != 0.0))
            .map(|s| Peak { dir: [s[1], s[2], s[3]], weight: s[0] })
            .collect();
        Self { comps, peaks }
    }
}

fn canonical(d: [f64; 3]) -> [f64; 3] {
    let flip = d[2] < 0.0
        || (d[2] == 0.0 && d[1] < 0.0)
        || (d[2] == 0.0 && d[1] == 0.0 && d[0] < 0.0);
    if flip {
        [-d[0], -d[1], -d[2]]
    } else {
        d
    }
}
