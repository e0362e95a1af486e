//! Cable cutting
//!
//! The user drags a straight line across the canvas; every cable the line
//! crosses becomes a candidate for a pass-through insertion. Cables are drawn
//! as cubic curves, so each one is sampled into a polyline and tested segment
//! by segment.

use std::collections::HashMap;

use crate::canvas::geometry::{cable_polyline, Point, Rect, Segment};
use crate::config::CutConfig;
use crate::patch::pin::decode;
use crate::patch::{ConnectionRegistry, LinkId, ModuleId, PinAddress, PinKey};
use crate::state::LayoutStore;

/// Canvas positions of pins as last drawn by the UI
#[derive(Debug, Clone, Default)]
pub struct GeometryCache {
    pins: HashMap<PinKey, Point>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record where a pin was drawn; unencodable pins are ignored
    pub fn set_pin(&mut self, pin: &PinAddress, position: Point) {
        let key = pin.encode();
        if key.is_valid() {
            self.pins.insert(key, position);
        }
    }

    pub fn pin(&self, pin: &PinAddress) -> Option<Point> {
        self.pins.get(&pin.encode()).copied()
    }

    /// Cached pin position, falling back to the owning module's anchor
    pub fn resolve(&self, pin: &PinAddress, layout: &LayoutStore) -> Option<Point> {
        self.pin(pin).or_else(|| layout.position(pin.module))
    }

    /// Forget every pin of a module
    pub fn forget_module(&mut self, module: ModuleId) {
        self.pins
            .retain(|key, _| decode(*key).map_or(false, |pin| pin.module != module));
    }

    pub fn clear(&mut self) {
        self.pins.clear();
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum GestureState {
    #[default]
    Idle,
    Drawing { start: Point, current: Point },
}

/// Press, drag, release. Cancelling at any point leaves nothing behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct CutGesture {
    state: GestureState,
}

impl CutGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, at: Point) {
        self.state = GestureState::Drawing {
            start: at,
            current: at,
        };
    }

    /// Ignored unless a press is in progress
    pub fn drag(&mut self, to: Point) {
        if let GestureState::Drawing { current, .. } = &mut self.state {
            *current = to;
        }
    }

    /// Finish the gesture, yielding the cut line
    pub fn release(&mut self) -> Option<Segment> {
        match std::mem::take(&mut self.state) {
            GestureState::Drawing { start, current } => Some(Segment::new(start, current)),
            GestureState::Idle => None,
        }
    }

    pub fn cancel(&mut self) {
        self.state = GestureState::Idle;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, GestureState::Drawing { .. })
    }

    /// Line to draw while the gesture is in progress
    pub fn preview(&self) -> Option<Segment> {
        match self.state {
            GestureState::Drawing { start, current } => Some(Segment::new(start, current)),
            GestureState::Idle => None,
        }
    }
}

/// A point where the cut crosses a cable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutHit {
    pub link: LinkId,
    pub point: Point,
}

fn near_parallel_hit(piece: &Segment, cut: &Segment, threshold: f32) -> Option<Point> {
    let candidates = [
        (piece.distance_to_point(cut.start), piece.closest_point(cut.start)),
        (piece.distance_to_point(cut.end), piece.closest_point(cut.end)),
        (cut.distance_to_point(piece.start), piece.start),
        (cut.distance_to_point(piece.end), piece.end),
    ];
    candidates
        .into_iter()
        .filter(|(d, _)| *d <= threshold)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, p)| p)
}

/// Every crossing between `cut` and a registered cable, ordered along the cut.
///
/// Links whose endpoints cannot be placed on the canvas are skipped.
pub fn find_cut_hits(
    registry: &ConnectionRegistry,
    geometry: &GeometryCache,
    layout: &LayoutStore,
    cut: &Segment,
    config: &CutConfig,
) -> Vec<CutHit> {
    let cut_box = cut.bounds();
    let mut hits: Vec<CutHit> = Vec::new();

    for (link, endpoints) in registry.iter() {
        let (Some(src), Some(dst)) = (decode(endpoints.src), decode(endpoints.dst)) else {
            continue;
        };
        let resolved = (geometry.resolve(&src, layout), geometry.resolve(&dst, layout));
        let (Some(from), Some(to)) = resolved else {
            continue;
        };

        let polyline = cable_polyline(from, to, config.curve_samples);
        let Some(bounds) = Rect::bounding(&polyline) else {
            continue;
        };
        if !bounds.padded(config.bbox_padding).overlaps(&cut_box) {
            continue;
        }

        let mut accepted: Vec<Point> = Vec::new();
        for pair in polyline.windows(2) {
            let piece = Segment::new(pair[0], pair[1]);
            let crossing = match piece.intersection(cut) {
                Some(p) => Some(p),
                None if piece.is_parallel_to(cut) => {
                    near_parallel_hit(&piece, cut, config.pick_threshold)
                }
                None => None,
            };
            let Some(point) = crossing else {
                continue;
            };
            if point.distance(from) < config.endpoint_margin
                || point.distance(to) < config.endpoint_margin
            {
                continue;
            }
            if accepted
                .iter()
                .any(|p| p.distance(point) < config.merge_distance)
            {
                continue;
            }
            accepted.push(point);
        }

        hits.extend(accepted.into_iter().map(|point| CutHit { link, point }));
    }

    hits.sort_by(|a, b| {
        cut.start
            .distance_sq(a.point)
            .total_cmp(&cut.start.distance_sq(b.point))
            .then(a.link.cmp(&b.link))
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Connection;
    use approx::assert_relative_eq;

    fn setup() -> (ConnectionRegistry, GeometryCache, LayoutStore) {
        let mut registry = ConnectionRegistry::new();
        registry.rebuild(&[Connection::new(ModuleId(1), 0, ModuleId(2), 0)]);

        let mut geometry = GeometryCache::new();
        geometry.set_pin(&PinAddress::output(ModuleId(1), 0), Point::new(0.0, 100.0));
        geometry.set_pin(&PinAddress::input(ModuleId(2), 0), Point::new(200.0, 100.0));
        (registry, geometry, LayoutStore::new())
    }

    #[test]
    fn test_gesture_lifecycle() {
        let mut gesture = CutGesture::new();
        assert!(gesture.release().is_none());

        gesture.drag(Point::new(5.0, 5.0));
        assert!(!gesture.is_active());

        gesture.press(Point::new(1.0, 2.0));
        gesture.drag(Point::new(3.0, 4.0));
        assert_eq!(
            gesture.preview(),
            Some(Segment::new(Point::new(1.0, 2.0), Point::new(3.0, 4.0)))
        );
        let cut = gesture.release().unwrap();
        assert_eq!(cut.end, Point::new(3.0, 4.0));
        assert!(!gesture.is_active());

        gesture.press(Point::ORIGIN);
        gesture.cancel();
        assert!(gesture.release().is_none());
    }

    #[test]
    fn test_cut_through_middle_hits_once() {
        let (registry, geometry, layout) = setup();
        let cut = Segment::new(Point::new(100.0, 50.0), Point::new(100.0, 150.0));

        let hits = find_cut_hits(&registry, &geometry, &layout, &cut, &CutConfig::default());
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].point.x, 100.0, epsilon = 1e-3);
        assert_relative_eq!(hits[0].point.y, 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_cut_missing_everything() {
        let (registry, geometry, layout) = setup();
        let cut = Segment::new(Point::new(100.0, 300.0), Point::new(150.0, 400.0));
        let hits = find_cut_hits(&registry, &geometry, &layout, &cut, &CutConfig::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_hits_near_pins_are_ignored() {
        let (registry, geometry, layout) = setup();
        let cut = Segment::new(Point::new(3.0, 50.0), Point::new(3.0, 150.0));
        let hits = find_cut_hits(&registry, &geometry, &layout, &cut, &CutConfig::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_parallel_cut_within_threshold() {
        let (registry, geometry, layout) = setup();
        let cut = Segment::new(Point::new(90.0, 102.0), Point::new(110.0, 102.0));

        let hits = find_cut_hits(&registry, &geometry, &layout, &cut, &CutConfig::default());
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].point.y, 100.0, epsilon = 1e-3);

        let far = Segment::new(Point::new(90.0, 120.0), Point::new(110.0, 120.0));
        let hits = find_cut_hits(&registry, &geometry, &layout, &far, &CutConfig::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_shallow_cut_alongside_cable() {
        let (registry, geometry, layout) = setup();
        let cut = Segment::new(Point::new(90.0, 101.5), Point::new(110.0, 102.3));

        let hits = find_cut_hits(&registry, &geometry, &layout, &cut, &CutConfig::default());
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].point.y, 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_wavy_cut_merges_close_hits() {
        let (registry, geometry, layout) = setup();
        // crosses the cable at a shallow angle, touching several polyline pieces
        let cut = Segment::new(Point::new(95.0, 98.0), Point::new(105.0, 102.0));
        let config = CutConfig {
            curve_samples: 64,
            ..Default::default()
        };
        let hits = find_cut_hits(&registry, &geometry, &layout, &cut, &config);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_anchor_fallback() {
        let mut registry = ConnectionRegistry::new();
        registry.rebuild(&[Connection::new(ModuleId(1), 0, ModuleId(2), 0)]);
        let mut layout = LayoutStore::new();
        layout.set_position(ModuleId(1), Point::new(0.0, 0.0));
        layout.set_position(ModuleId(2), Point::new(200.0, 0.0));

        let cut = Segment::new(Point::new(100.0, -50.0), Point::new(100.0, 50.0));
        let geometry = GeometryCache::new();
        let hits = find_cut_hits(&registry, &geometry, &layout, &cut, &CutConfig::default());
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_forget_module() {
        let (_, mut geometry, _) = setup();
        geometry.forget_module(ModuleId(1));
        assert_eq!(geometry.len(), 1);
        assert!(geometry.pin(&PinAddress::input(ModuleId(2), 0)).is_some());
    }
}
