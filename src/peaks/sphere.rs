//! Direction sets on the unit sphere with a neighbor graph

use crate::error::{ConfigError, ConfigResult};
use super::icosphere::{face_neighbors, icosphere};

/// Finest icosphere level accepted from callers (40962 directions)
pub const MAX_SUBDIVISIONS: usize = 6;

/// Axial angle between two unit vectors in degrees, in [0, 90]
///
/// Directions are treated as lines, so v and -v are the same direction.
#[inline]
pub fn axial_angle_deg(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dot = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).abs().min(1.0);
    dot.acos().to_degrees()
}

/// ODF sampling: unit directions plus the neighbor relation used for
/// local-maximum detection
#[derive(Clone, Debug, PartialEq)]
pub struct SphereSampling {
    dirs: Vec<[f64; 3]>,
    neighbors: Vec<Vec<usize>>,
}

impl SphereSampling {
    /// Subdivided icosahedron with neighbors taken from its triangles
    pub fn icosphere(subdivisions: usize) -> Self {
        let (dirs, faces) = icosphere(subdivisions);
        let neighbors = face_neighbors(dirs.len(), &faces);
        Self { dirs, neighbors }
    }

    /// `icosphere` for a caller-supplied level, rejecting levels above
    /// `MAX_SUBDIVISIONS`
    pub fn checked_icosphere(subdivisions: usize) -> ConfigResult<Self> {
        if subdivisions > MAX_SUBDIVISIONS {
            return Err(ConfigError::InvalidParameter(format!(
                "icosphere level {} above maximum {}", subdivisions, MAX_SUBDIVISIONS
            )));
        }
        Ok(Self::icosphere(subdivisions))
    }

    /// Arbitrary directions with an explicit neighbor graph
    ///
    /// Directions are normalized; the graph is made symmetric and
    /// self-links are dropped.
    pub fn from_graph(dirs: Vec<[f64; 3]>, neighbors: Vec<Vec<usize>>) -> ConfigResult<Self> {
        ConfigError::check_dim("neighbor lists", dirs.len(), neighbors.len())?;
        if dirs.is_empty() {
            return Err(ConfigError::InvalidParameter("sphere sampling has no directions".to_string()));
        }

        let n = dirs.len();
        let mut dirs_out = Vec::with_capacity(n);
        for v in dirs {
            let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            if !(norm > 1e-12) || !norm.is_finite() {
                return Err(ConfigError::InvalidParameter(format!("invalid direction {:?}", v)));
            }
            dirs_out.push([v[0] / norm, v[1] / norm, v[2] / norm]);
        }

        let mut graph: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, list) in neighbors.iter().enumerate() {
            for &j in list {
                if j >= n {
                    return Err(ConfigError::InvalidParameter(format!(
                        "neighbor {} of direction {} outside 0..{}", j, i, n
                    )));
                }
                if j != i {
                    graph[i].push(j);
                    graph[j].push(i);
                }
            }
        }
        for list in graph.iter_mut() {
            list.sort_unstable();
            list.dedup();
        }

        Ok(Self { dirs: dirs_out, neighbors: graph })
    }

    /// Number of directions (ODF length)
    #[inline]
    pub fn size(&self) -> usize {
        self.dirs.len()
    }

    #[inline]
    pub fn dir(&self, i: usize) -> [f64; 3] {
        self.dirs[i]
    }

    pub fn dirs(&self) -> &[[f64; 3]] {
        &self.dirs
    }

    #[inline]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    /// Index of the direction closest to `v` as an axis
    pub fn nearest(&self, v: &[f64; 3]) -> usize {
        let mut best = 0;
        let mut best_dot = f64::NEG_INFINITY;
        for (i, d) in self.dirs.iter().enumerate() {
            let dot = (d[0] * v[0] + d[1] * v[1] + d[2] * v[2]).abs();
            if dot > best_dot {
                best_dot = dot;
                best = i;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axial_angle() {
        let x = [1.0, 0.0, 0.0];
        let y = [0.0, 1.0, 0.0];
        assert!((axial_angle_deg(&x, &y) - 90.0).abs() < 1e-12);
        assert!(axial_angle_deg(&x, &[-1.0, 0.0, 0.0]).abs() < 1e-6);
        let d = [0.5f64.sqrt(), 0.5f64.sqrt(), 0.0];
        assert!((axial_angle_deg(&x, &d) - 45.0).abs() < 1e-10);
    }

    #[test]
    fn test_icosphere_sampling() {
        let sphere = SphereSampling::icosphere(3);
        assert_eq!(sphere.size(), 642);
        assert_eq!(sphere.neighbors(0).len(), 5);
        assert_eq!(sphere.nearest(&sphere.dir(17)), 17);
    }

    #[test]
    fn test_checked_icosphere_level() {
        assert_eq!(SphereSampling::checked_icosphere(2).unwrap(), SphereSampling::icosphere(2));
        let err = SphereSampling::checked_icosphere(MAX_SUBDIVISIONS + 1).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter(_)));
        assert!(SphereSampling::checked_icosphere(12).is_err());
    }

    #[test]
    fn test_from_graph_symmetrizes() {
        let dirs = vec![[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]];
        let sphere = SphereSampling::from_graph(dirs, vec![vec![1], vec![], vec![2, 1]]).unwrap();
        assert_eq!(sphere.neighbors(0), &[1]);
        assert_eq!(sphere.neighbors(1), &[0, 2]);
        assert_eq!(sphere.neighbors(2), &[1]);
        assert_eq!(sphere.dir(1), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_from_graph_rejects_bad_input() {
        assert!(SphereSampling::from_graph(vec![[1.0, 0.0, 0.0]], vec![vec![3]]).is_err());
        assert!(SphereSampling::from_graph(vec![[0.0, 0.0, 0.0]], vec![vec![]]).is_err());
        assert!(SphereSampling::from_graph(vec![[1.0, 0.0, 0.0]], vec![]).is_err());
    }
}
