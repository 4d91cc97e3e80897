//! Regular voxel grids

use std::fmt;

/// One voxel coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Sample {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl Sample {
    pub fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.i, self.j, self.k)
    }
}

/// Immutable description of a 3D voxel grid
#[derive(Clone, Debug, PartialEq)]
pub struct Sampling {
    nx: usize,
    ny: usize,
    nz: usize,
    /// Voxel sizes in mm
    voxel_size: (f64, f64, f64),
    /// Voxel→world transform (4x4, row-major)
    affine: [f64; 16],
}

impl Sampling {
    /// Grid with unit voxels and a diagonal affine
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self::with_voxel_size(nx, ny, nz, (1.0, 1.0, 1.0))
    }

    /// Grid with the given voxel size and a diagonal (scaling only) affine
    pub fn with_voxel_size(nx: usize, ny: usize, nz: usize, voxel_size: (f64, f64, f64)) -> Self {
        let (vsx, vsy, vsz) = voxel_size;
        let affine = [
            vsx, 0.0, 0.0, 0.0,
            0.0, vsy, 0.0, 0.0,
            0.0, 0.0, vsz, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        Self { nx, ny, nz, voxel_size, affine }
    }

    /// Replace the voxel→world affine
    pub fn with_affine(mut self, affine: [f64; 16]) -> Self {
        self.affine = affine;
        self
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn voxel_size(&self) -> (f64, f64, f64) {
        self.voxel_size
    }

    #[inline]
    pub fn affine(&self) -> &[f64; 16] {
        &self.affine
    }

    /// Total number of voxels
    #[inline]
    pub fn size(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Linear (Fortran order) index of a sample
    #[inline(always)]
    pub fn index(&self, s: Sample) -> usize {
        s.i + s.j * self.nx + s.k * self.nx * self.ny
    }

    /// Sample at a linear index
    #[inline]
    pub fn sample(&self, idx: usize) -> Sample {
        let i = idx % self.nx;
        let j = (idx / self.nx) % self.ny;
        let k = idx / (self.nx * self.ny);
        Sample { i, j, k }
    }

    /// Whether a (possibly negative) coordinate lies inside the grid
    pub fn contains(&self, i: isize, j: isize, k: isize) -> bool {
        i >= 0 && j >= 0 && k >= 0
            && (i as usize) < self.nx
            && (j as usize) < self.ny
            && (k as usize) < self.nz
    }

    /// World coordinate of a voxel center
    pub fn world(&self, s: Sample) -> [f64; 3] {
        let a = &self.affine;
        let (x, y, z) = (s.i as f64, s.j as f64, s.k as f64);
        [
            a[0] * x + a[1] * y + a[2] * z + a[3],
            a[4] * x + a[5] * y + a[6] * z + a[7],
            a[8] * x + a[9] * y + a[10] * z + a[11],
        ]
    }

    /// Same grid dimensions (voxel size and affine are not compared)
    pub fn same_grid(&self, other: &Sampling) -> bool {
        self.dims() == other.dims()
    }

    /// All samples in Fortran order
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        (0..self.size()).map(move |idx| self.sample(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        let sampling = Sampling::new(4, 3, 2);
        assert_eq!(sampling.size(), 24);
        for (idx, s) in sampling.iter().enumerate() {
            assert_eq!(sampling.index(s), idx);
        }
        assert_eq!(sampling.sample(5), Sample::new(1, 1, 0));
        assert_eq!(sampling.sample(23), Sample::new(3, 2, 1));
    }

    #[test]
    fn test_world_coordinates() {
        let sampling = Sampling::with_voxel_size(10, 10, 10, (2.0, 2.0, 3.0));
        assert_eq!(sampling.world(Sample::new(1, 2, 3)), [2.0, 4.0, 9.0]);

        let mut affine = *sampling.affine();
        affine[3] = -10.0;
        let shifted = sampling.with_affine(affine);
        assert_eq!(shifted.world(Sample::new(0, 0, 0)), [-10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_contains() {
        let sampling = Sampling::new(2, 2, 2);
        assert!(sampling.contains(1, 1, 1));
        assert!(!sampling.contains(-1, 0, 0));
        assert!(!sampling.contains(0, 2, 0));
    }

    #[test]
    fn test_sample_display() {
        assert_eq!(Sample::new(1, 2, 3).to_string(), "(1, 2, 3)");
    }
}
