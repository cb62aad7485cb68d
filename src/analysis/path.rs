//! Polylines and the log-frequency axis shared by every display path

use serde::{Deserialize, Serialize};

/// Linear remap of `value` from `[src_lo, src_hi]` onto `[dst_lo, dst_hi]`
#[inline]
pub fn remap(value: f32, src_lo: f32, src_hi: f32, dst_lo: f32, dst_hi: f32) -> f32 {
    dst_lo + (value - src_lo) * (dst_hi - dst_lo) / (src_hi - src_lo)
}

/// Proportion 0..=1 along a log axis → value in `[min, max]`
#[inline]
pub fn map_to_log10(proportion: f64, min: f64, max: f64) -> f64 {
    min * (max / min).powf(proportion)
}

/// Value in `[min, max]` → proportion 0..=1 along a log axis
#[inline]
pub fn map_from_log10(value: f64, min: f64, max: f64) -> f64 {
    (value / min).log10() / (max / min).log10()
}

/// Axis-aligned drawing area
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Whole horizontal pixels
    pub fn pixel_width(&self) -> usize {
        if self.width.is_finite() && self.width > 0.0 {
            self.width as usize
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_width() == 0 || !(self.height > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Open polyline in drawing coordinates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Path {
    pub points: Vec<Point>,
}

impl Path {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn push(&mut self, x: f32, y: f32) {
        self.points.push(Point { x, y });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// SVG path data ("M x y L x y ...")
    pub fn to_svg(&self) -> String {
        let mut out = String::with_capacity(self.points.len() * 16);
        for (i, p) in self.points.iter().enumerate() {
            let cmd = if i == 0 { 'M' } else { 'L' };
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{} {:.2} {:.2}", cmd, p.x, p.y));
        }
        out
    }
}

/// Frequencies that get a vertical grid line
pub const FREQUENCY_GRID: [f32; 10] = [
    20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0,
];

/// Gains (dB) that get a horizontal grid line
pub const GAIN_GRID: [f32; 5] = [-24.0, -12.0, 0.0, 12.0, 24.0];

/// A grid line: its value and its position along the relevant axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridLine {
    pub value: f32,
    pub position: f32,
}

/// x positions of [`FREQUENCY_GRID`] inside `bounds`
pub fn frequency_grid(bounds: &Rect, min_freq: f32, max_freq: f32) -> Vec<GridLine> {
    FREQUENCY_GRID
        .iter()
        .filter(|&&f| f >= min_freq && f <= max_freq)
        .map(|&f| GridLine {
            value: f,
            position: bounds.x
                + bounds.width * map_from_log10(f as f64, min_freq as f64, max_freq as f64) as f32,
        })
        .collect()
}

/// y positions of [`GAIN_GRID`] inside `bounds` for a `±range_db` scale
pub fn gain_grid(bounds: &Rect, range_db: f32) -> Vec<GridLine> {
    GAIN_GRID
        .iter()
        .filter(|&&g| g.abs() <= range_db)
        .map(|&g| GridLine {
            value: g,
            position: remap(g, -range_db, range_db, bounds.bottom(), bounds.y),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_axis_round_trip() {
        assert_relative_eq!(map_to_log10(0.0, 20.0, 20000.0), 20.0, epsilon = 1e-9);
        assert_relative_eq!(map_to_log10(1.0, 20.0, 20000.0), 20000.0, epsilon = 1e-6);
        assert_relative_eq!(map_to_log10(0.5, 20.0, 20000.0), 632.455, epsilon = 1e-3);
        assert_relative_eq!(map_from_log10(632.455532, 20.0, 20000.0), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_frequency_grid_spans_bounds() {
        let bounds = Rect::new(10.0, 0.0, 300.0, 100.0);
        let lines = frequency_grid(&bounds, 20.0, 20000.0);
        assert_eq!(lines.len(), 10);
        assert_relative_eq!(lines[0].position, 10.0);
        assert_relative_eq!(lines[9].position, 310.0, epsilon = 1e-3);
        assert!(lines.windows(2).all(|w| w[1].position > w[0].position));
    }

    #[test]
    fn test_gain_grid_puts_zero_in_the_middle() {
        let bounds = Rect::new(0.0, 20.0, 100.0, 200.0);
        let lines = gain_grid(&bounds, 24.0);
        assert_eq!(lines.len(), 5);
        assert_relative_eq!(lines[0].position, 220.0);
        assert_relative_eq!(lines[2].position, 120.0);
        assert_relative_eq!(lines[4].position, 20.0);
    }

    #[test]
    fn test_svg_output() {
        let mut path = Path::default();
        path.push(0.0, 1.0);
        path.push(2.5, 3.0);
        assert_eq!(path.to_svg(), "M 0.00 1.00 L 2.50 3.00");
    }
}
