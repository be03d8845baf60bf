//! MVT geometry command encoding. Coordinates are integer tile units with
//! `y` pointing down; all commands use zigzag-encoded deltas from a cursor
//! that persists across the parts of a multi-geometry.

use geozero::mvt::tile::GeomType;

use crate::mvt::mvt_commands::{Command, CommandInteger, ParameterInteger};

/// Accumulates the command stream for one feature. Multi-geometries are
/// built by repeated `add_*` calls; the cursor carries over between parts.
#[derive(Debug)]
pub struct GeomEncoder {
    geom_type: GeomType,
    data: Vec<u32>,
    cursor: (i32, i32),
}

impl GeomEncoder {
    #[must_use]
    pub fn new(geom_type: GeomType) -> Self {
        Self {
            geom_type,
            data: Vec::new(),
            cursor: (0, 0),
        }
    }

    #[must_use]
    pub fn geom_type(&self) -> GeomType {
        self.geom_type
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn into_data(self) -> Vec<u32> {
        self.data
    }

    fn move_to(&mut self, x: i32, y: i32) {
        self.data.push(CommandInteger::from(Command::MoveTo, 1));
        self.push_delta(x, y);
    }

    fn push_delta(&mut self, x: i32, y: i32) {
        self.data.push(ParameterInteger::from(x - self.cursor.0));
        self.data.push(ParameterInteger::from(y - self.cursor.1));
        self.cursor = (x, y);
    }

    pub fn add_point(&mut self, x: i32, y: i32) {
        debug_assert_eq!(self.geom_type, GeomType::Point);
        self.move_to(x, y);
    }

    /// Appends one linestring of at least two points.
    pub fn add_linestring(&mut self, pts: &[(i32, i32)]) {
        debug_assert_eq!(self.geom_type, GeomType::Linestring);
        debug_assert!(pts.len() >= 2);
        self.move_to(pts[0].0, pts[0].1);
        self.data
            .push(CommandInteger::from(Command::LineTo, pts.len() as u32 - 1));
        for &(x, y) in &pts[1..] {
            self.push_delta(x, y);
        }
    }

    /// Appends one ring given with an explicit closing point (`last == first`);
    /// the closing point is encoded as `ClosePath`.
    pub fn add_ring(&mut self, pts: &[(i32, i32)]) {
        debug_assert_eq!(self.geom_type, GeomType::Polygon);
        debug_assert!(pts.len() >= 4);
        debug_assert_eq!(pts.first(), pts.last());
        self.move_to(pts[0].0, pts[0].1);
        self.data
            .push(CommandInteger::from(Command::LineTo, pts.len() as u32 - 2));
        for &(x, y) in &pts[1..pts.len() - 1] {
            self.push_delta(x, y);
        }
        self.data.push(CommandInteger::from(Command::ClosePath, 1));
    }
}
