//! Render-ready scatter points.

/// Colour class of a chart point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointColor {
    /// Gated out: drawn invisibly so the x position is still occupied.
    Transparent,
    /// Live microphone estimate.
    Record,
    /// Reference curve point.
    Song,
}

impl PointColor {
    /// Live points are opaque once the confidence reaches `gate`.
    pub fn for_live(confidence: f32, gate: f32) -> Self {
        if confidence >= gate {
            PointColor::Record
        } else {
            PointColor::Transparent
        }
    }

    /// Reference points are opaque once the confidence reaches `gate`.
    pub fn for_reference(confidence: f32, gate: f32) -> Self {
        if confidence >= gate {
            PointColor::Song
        } else {
            PointColor::Transparent
        }
    }

    /// Unmultiplied `[r, g, b, a]`.
    pub fn rgba(self) -> [u8; 4] {
        match self {
            PointColor::Transparent => [0, 0, 0, 0],
            PointColor::Record => [255, 0, 0, 255],
            PointColor::Song => [0, 255, 0, 255],
        }
    }

    pub fn is_visible(self) -> bool {
        self != PointColor::Transparent
    }
}

/// One scatter mark.  `x` is the slot within its own series' history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub x: usize,
    pub y: f32,
    pub color: PointColor,
}

/// Everything the renderer needs for one redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartFrame {
    /// Live points first, then reference points.
    pub points: Vec<ChartPoint>,
    /// Slots per series (the history capacity).
    pub x_slots: usize,
    /// Upper bound of the fixed y-domain `[0, y_max]`.
    pub y_max: f32,
}

impl ChartFrame {
    pub fn empty(x_slots: usize, y_max: f32) -> Self {
        Self {
            points: Vec::new(),
            x_slots,
            y_max,
        }
    }

    pub fn y_domain(&self) -> (f32, f32) {
        (0.0, self.y_max)
    }

    /// Points of one colour.
    pub fn series(&self, color: PointColor) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter().filter(move |p| p.color == color)
    }
}

impl Default for ChartFrame {
    fn default() -> Self {
        Self::empty(50, 500.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gates_are_inclusive() {
        assert_eq!(PointColor::for_live(0.5, 0.5), PointColor::Record);
        assert_eq!(PointColor::for_live(0.49, 0.5), PointColor::Transparent);
        assert_eq!(PointColor::for_reference(0.7, 0.7), PointColor::Song);
        assert_eq!(PointColor::for_reference(0.69, 0.7), PointColor::Transparent);
    }

    #[test]
    fn colours_match_the_chart_palette() {
        assert_eq!(PointColor::Record.rgba(), [255, 0, 0, 255]);
        assert_eq!(PointColor::Song.rgba(), [0, 255, 0, 255]);
        assert_eq!(PointColor::Transparent.rgba()[3], 0);
        assert!(!PointColor::Transparent.is_visible());
    }

    #[test]
    fn default_frame_has_fixed_domain() {
        let frame = ChartFrame::default();
        assert_eq!(frame.y_domain(), (0.0, 500.0));
        assert!(frame.points.is_empty());
    }
}
