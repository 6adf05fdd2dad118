//! Body bounds and plate thickness from sampled edge points
//!
//! Every edge of a body is asked for a representative point. Some curve types
//! cannot produce one; those samples are skipped. The bounds are only defined
//! once at least one sample succeeded.

use dxport_kernel::{CadError, CadSession, ObjectId, PartId};
use glam::DVec3;

/// Result of querying one edge for a point
pub type EdgeSample = Result<DVec3, CadError>;

/// Axis-aligned bounds of the sampled points of a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingInterval {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingInterval {
    /// Bounds containing a single point
    pub fn from_point(point: DVec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Grow the bounds to include a point
    pub fn include(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Z extent of the bounds
    pub fn thickness(&self) -> f64 {
        (self.max.z - self.min.z).abs()
    }

    /// Thickness to call out on the note.
    ///
    /// A body whose lowest point lies exactly on the datum plane (min Z == 0)
    /// gets no thickness callout.
    pub fn thickness_callout(&self) -> Option<f64> {
        (self.min.z != 0.0).then(|| self.thickness())
    }
}

/// Running min/max over edge samples
#[derive(Debug, Clone, Default)]
pub struct BoundsAccumulator {
    bounds: Option<BoundingInterval>,
    sampled: usize,
    failed: usize,
}

impl BoundsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one sample; failures are counted and otherwise ignored
    pub fn add(&mut self, sample: &EdgeSample) {
        match sample {
            Ok(point) => {
                self.sampled += 1;
                match &mut self.bounds {
                    Some(bounds) => bounds.include(*point),
                    None => self.bounds = Some(BoundingInterval::from_point(*point)),
                }
            }
            Err(_) => self.failed += 1,
        }
    }

    pub fn finish(self) -> BodyBounds {
        BodyBounds {
            bounds: self.bounds,
            sampled: self.sampled,
            failed: self.failed,
        }
    }
}

/// Bounds measurement of one body
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyBounds {
    /// `None` when no edge produced a point
    pub bounds: Option<BoundingInterval>,
    /// Edges that produced a point
    pub sampled: usize,
    /// Edges whose point query failed
    pub failed: usize,
}

impl BodyBounds {
    /// Aggregate a sequence of samples
    pub fn from_samples(samples: impl IntoIterator<Item = EdgeSample>) -> Self {
        let mut acc = BoundsAccumulator::new();
        for sample in samples {
            acc.add(&sample);
        }
        acc.finish()
    }

    /// Thickness callout, absent when there is no measurement
    pub fn thickness_callout(&self) -> Option<f64> {
        self.bounds.as_ref().and_then(BoundingInterval::thickness_callout)
    }
}

/// Sample every edge of `body` and compute its bounds
pub fn compute_bounds<S: CadSession + ?Sized>(
    session: &mut S,
    part: PartId,
    body: ObjectId,
) -> BodyBounds {
    let edges = match session.body_edges(body) {
        Ok(edges) => edges,
        Err(e) => {
            tracing::warn!("Could not enumerate edges of body {}: {}", body, e);
            return BodyBounds::default();
        }
    };

    let mut acc = BoundsAccumulator::new();
    for edge in edges {
        let sample = session.edge_sample_point(part, edge);
        if let Err(e) = &sample {
            tracing::trace!("Skipping edge {}: {}", edge.index, e);
        }
        acc.add(&sample);
    }

    let result = acc.finish();
    if result.bounds.is_none() {
        tracing::warn!("No edge of body {} produced a point; bounds unavailable", body);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dxport_kernel::{BodyModel, EdgeModel, MemorySession, PartModel};
    use std::path::Path;

    fn fail() -> EdgeSample {
        Err(CadError::Sampling("no point".into()))
    }

    #[test]
    fn test_min_max_over_samples() {
        let result = BodyBounds::from_samples([
            Ok(DVec3::new(1.0, 2.0, -0.5)),
            Ok(DVec3::new(-3.0, 5.0, 0.25)),
            Ok(DVec3::new(0.0, 0.0, 0.0)),
        ]);

        let bounds = result.bounds.unwrap();
        assert_eq!(bounds.min, DVec3::new(-3.0, 0.0, -0.5));
        assert_eq!(bounds.max, DVec3::new(1.0, 5.0, 0.25));
        assert_relative_eq!(bounds.thickness(), 0.75);
        assert_eq!(result.sampled, 3);
        assert_eq!(result.failed, 0);
    }

    #[test]
    fn test_failed_samples_do_not_affect_bounds() {
        let with_failures = BodyBounds::from_samples([
            fail(),
            Ok(DVec3::new(1.0, 1.0, 2.0)),
            fail(),
            Ok(DVec3::new(4.0, 3.0, 2.5)),
        ]);
        let without = BodyBounds::from_samples([
            Ok(DVec3::new(1.0, 1.0, 2.0)),
            Ok(DVec3::new(4.0, 3.0, 2.5)),
        ]);

        assert_eq!(with_failures.bounds, without.bounds);
        assert_eq!(with_failures.failed, 2);
    }

    #[test]
    fn test_no_successful_samples_means_no_bounds() {
        let result = BodyBounds::from_samples([fail(), fail()]);
        assert_eq!(result.bounds, None);
        assert_eq!(result.thickness_callout(), None);

        let empty = BodyBounds::from_samples(std::iter::empty());
        assert_eq!(empty.bounds, None);
    }

    #[test]
    fn test_thickness_callout_suppressed_on_datum() {
        let seated = BodyBounds::from_samples([
            Ok(DVec3::new(0.0, 0.0, 0.0)),
            Ok(DVec3::new(10.0, 5.0, 0.5)),
        ]);
        assert_eq!(seated.thickness_callout(), None);

        let offset = BodyBounds::from_samples([
            Ok(DVec3::new(0.0, 0.0, -0.5)),
            Ok(DVec3::new(10.0, 5.0, 0.0)),
        ]);
        assert_relative_eq!(offset.thickness_callout().unwrap(), 0.5);
    }

    #[test]
    fn test_min_never_exceeds_max() {
        let points = [
            DVec3::new(3.0, -1.0, 7.0),
            DVec3::new(-2.0, 4.0, -6.0),
            DVec3::new(0.5, 0.5, 0.5),
            DVec3::new(9.0, -8.0, 1.0),
        ];
        for n in 1..=points.len() {
            let result = BodyBounds::from_samples(points[..n].iter().copied().map(Ok));
            let bounds = result.bounds.unwrap();
            assert!(bounds.min.cmple(bounds.max).all());
            assert!(bounds.thickness() >= 0.0);
        }
    }

    #[test]
    fn test_compute_bounds_from_session() {
        let body = BodyModel::plate("web", DVec3::new(0.0, 0.0, -0.5), DVec3::new(8.0, 2.0, 0.0))
            .with_edge(EdgeModel::failing(DVec3::ZERO, DVec3::new(0.0, 0.0, 100.0)));
        let mut session =
            MemorySession::new().with_part("p.prt", PartModel::new().with_body(body));
        let part = session.open_part(Path::new("p.prt")).unwrap();
        let body = session.bodies(part.id).unwrap()[0].id;

        let result = compute_bounds(&mut session, part.id, body);
        assert_eq!(result.sampled, 12);
        assert_eq!(result.failed, 1);

        let bounds = result.bounds.unwrap();
        assert_relative_eq!(bounds.min.z, -0.5);
        assert_relative_eq!(bounds.max.z, 0.0);
        assert_relative_eq!(result.thickness_callout().unwrap(), 0.5);
    }
}
