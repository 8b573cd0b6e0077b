//! Rotational symmetry: every sample is repeated around the surface centre
//! on `axis_count` evenly spaced axes.

use crate::canvas::{RasterTarget, rotate};
use crate::components::tools::StrokeEngine;

pub const MIN_AXES: u32 = 1;
pub const MAX_AXES: u32 = 10;
const FULL_TURN: f64 = 360.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymmetryController {
    axes: u32,
}

impl Default for SymmetryController {
    fn default() -> Self {
        Self { axes: MIN_AXES }
    }
}

impl SymmetryController {
    pub fn new(axes: i64) -> Self {
        let mut controller = Self::default();
        controller.set_axis_count(axes);
        controller
    }

    pub fn axis_count(&self) -> u32 {
        self.axes
    }

    /// Clamp into `[MIN_AXES, MAX_AXES]` and return the stored count.
    pub fn set_axis_count(&mut self, axes: i64) -> u32 {
        self.axes = axes.clamp(MIN_AXES as i64, MAX_AXES as i64) as u32;
        self.axes
    }

    /// Advance to the next count, wrapping `MAX_AXES → MIN_AXES`.
    pub fn cycle(&mut self) -> u32 {
        self.axes = if self.axes >= MAX_AXES {
            MIN_AXES
        } else {
            self.axes + 1
        };
        self.axes
    }

    /// Angle between neighbouring axes, in degrees.
    pub fn step(&self) -> f64 {
        FULL_TURN / self.axes as f64
    }

    /// Rotation applied to `axis`.  Axis 0 sits one step short of a full
    /// turn; the last axis is the unrotated primary stroke.
    pub fn angle(&self, axis: usize) -> f64 {
        FULL_TURN - (axis as f64 + 1.0) * self.step()
    }

    /// Rotated counterpart of `(x, y)` for every axis, in axis order.
    pub fn positions(&self, center: (f64, f64), x: f64, y: f64) -> impl Iterator<Item = (usize, (i32, i32))> + '_ {
        (0..self.axes as usize).map(move |axis| (axis, rotate(center.0, center.1, x, y, self.angle(axis))))
    }

    /// Fan one pressed sample out to every axis.  An axis without trace
    /// history gets a dot and is seeded; the others extend their segment.
    /// Returns the number of segments painted.
    pub fn render_sample<T: RasterTarget + ?Sized>(
        &self,
        engine: &mut StrokeEngine,
        target: &mut T,
        center: (f64, f64),
        x: f64,
        y: f64,
    ) -> usize {
        let radius = engine.brush().dot_radius();
        let mut segments = 0;
        for (axis, (rx, ry)) in self.positions(center, x, y) {
            if !engine.has_history(axis) {
                engine.render_dot(target, rx, ry, radius);
            }
            if engine.render_trace(target, axis, rx, ry).is_some() {
                segments += 1;
            }
        }
        segments
    }

    /// Terminal dot on every axis.
    pub fn render_dots<T: RasterTarget + ?Sized>(
        &self,
        engine: &StrokeEngine,
        target: &mut T,
        center: (f64, f64),
        x: f64,
        y: f64,
    ) {
        let radius = engine.brush().dot_radius();
        for (_, (rx, ry)) in self.positions(center, x, y) {
            engine.render_dot(target, rx, ry, radius);
        }
    }
}
