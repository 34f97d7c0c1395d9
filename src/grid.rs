//! Geometry of the grid: extents, the equal-area partition and station selection by distance.
use std::{f64::consts::PI, fmt::Display};

/// Number of boxes in each latitude band, north to south.
pub const BAND_BOXES: [usize; 8] = [4, 8, 12, 16, 16, 12, 8, 4];

/// Sine of the latitude boundaries of the bands, north to south.
pub const BAND_SINES: [f64; 9] = [1.0, 0.9, 0.7, 0.4, 0.0, -0.4, -0.7, -0.9, -1.0];

/// Total number of boxes in the equal-area grid.
pub const BOX_COUNT: usize = 80;

/// Cells along each side of a box.
pub const CELLS_PER_SIDE: usize = 10;

/// Number of cells in each box.
pub const CELLS_PER_BOX: usize = CELLS_PER_SIDE * CELLS_PER_SIDE;

/// A latitude/longitude rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    /// Southern boundary.
    pub south: f64,
    /// Northern boundary.
    pub north: f64,
    /// Western boundary.
    pub west: f64,
    /// Eastern boundary.
    pub east: f64,
}

impl Extent {
    /// Create a new extent.
    #[inline]
    pub fn new(south: f64, north: f64, west: f64, east: f64) -> Self {
        Extent {
            south,
            north,
            west,
            east,
        }
    }

    /// The centre as (latitude, longitude).
    ///
    /// The latitude splits the area in half, so it is the arcsine of the mean sine of the
    /// boundaries rather than their mean.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use temperature_analysis::grid::Extent;
    ///
    /// let (lat, lon) = Extent::new(0.0, 90.0, -180.0, -90.0).centre();
    /// assert!((lat - 30.0).abs() < 1.0e-10);
    /// assert_eq!(lon, -135.0);
    /// ```
    pub fn centre(&self) -> (f64, f64) {
        let sine = 0.5 * (self.south.to_radians().sin() + self.north.to_radians().sin());
        (sine.asin().to_degrees(), 0.5 * (self.west + self.east))
    }

    /// Whether a point falls in the extent.
    ///
    /// Points on the southern or western boundary are inside, points on the northern or
    /// eastern boundary are not, so neighbouring extents never both claim a point. The
    /// longitude is wrapped by a full turn if that brings it in range.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let lon = if lon > self.east {
            lon - 360.0
        } else if lon < self.west {
            lon + 360.0
        } else {
            lon
        };

        (self.south < lat && lat < self.north && self.west < lon && lon < self.east)
            || (self.south == lat && self.west <= lon && lon < self.east)
            || (self.west == lon && self.south <= lat && lat < self.north)
    }

    /// Whether the extent touches a pole.
    #[inline]
    pub fn is_polar(&self) -> bool {
        self.south <= -90.0 || self.north >= 90.0
    }

    /// The area searched for stations that may contribute to cells of this box. It is widened
    /// by `arc_degrees` north and south and by half its width east and west. For boxes touching
    /// a pole every longitude is searched.
    pub fn search_area(&self, arc_degrees: f64) -> Extent {
        let half_width = 0.5 * (self.east - self.west);
        if self.is_polar() {
            Extent::new(
                self.south - arc_degrees,
                self.north + arc_degrees,
                -180.0,
                180.0,
            )
        } else {
            Extent::new(
                self.south - arc_degrees,
                self.north + arc_degrees,
                self.west - half_width,
                self.east + half_width,
            )
        }
    }
}

/// Labelled by the centre, e.g. `+64.2-157.5`.
impl Display for Extent {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (lat, lon) = self.centre();
        write!(formatter, "{:+05.1}{:+06.1}", lat, lon)
    }
}

/// A box of the grid and the cells it is split into.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// The box.
    pub extent: Extent,
    /// The cells, in the order their records are produced.
    pub cells: Vec<Extent>,
}

/// A division of the sphere into regions of cells.
pub trait Partition {
    /// Every region in a fixed order.
    fn regions(&self) -> Vec<Region>;
}

/// The 80 box equal-area grid, each box split into 100 equal-area cells.
///
/// Boxes are numbered band by band from the north pole, and west to east from 180W within a
/// band. Cells within a box run west to east in rows from south to north.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualAreaGrid;

impl EqualAreaGrid {
    /// Create the grid.
    #[inline]
    pub fn new() -> Self {
        EqualAreaGrid
    }

    /// The 80 boxes.
    pub fn boxes(&self) -> Vec<Extent> {
        let mut boxes = Vec::with_capacity(BOX_COUNT);
        for (band, &count) in BAND_BOXES.iter().enumerate() {
            let north = BAND_SINES[band].asin().to_degrees();
            let south = BAND_SINES[band + 1].asin().to_degrees();
            let width = 360.0 / count as f64;
            for i in 0..count {
                let west = -180.0 + width * i as f64;
                boxes.push(Extent::new(south, north, west, west + width));
            }
        }
        boxes
    }

    /// Split a box into equal-area cells.
    pub fn cells(&self, extent: &Extent) -> Vec<Extent> {
        let sin_s = extent.south.to_radians().sin();
        let sin_n = extent.north.to_radians().sin();
        let lat_at = |j: usize| {
            let sine = sin_s + (sin_n - sin_s) * j as f64 / CELLS_PER_SIDE as f64;
            // Keep the boundaries exact at the box edges.
            if j == 0 {
                extent.south
            } else if j == CELLS_PER_SIDE {
                extent.north
            } else {
                sine.asin().to_degrees()
            }
        };
        let width = (extent.east - extent.west) / CELLS_PER_SIDE as f64;

        let mut cells = Vec::with_capacity(CELLS_PER_BOX);
        for row in 0..CELLS_PER_SIDE {
            let (south, north) = (lat_at(row), lat_at(row + 1));
            for col in 0..CELLS_PER_SIDE {
                let west = extent.west + width * col as f64;
                cells.push(Extent::new(south, north, west, west + width));
            }
        }
        cells
    }

    /// Index of the band a box belongs to.
    pub fn band_of(box_index: usize) -> Option<usize> {
        let mut end = 0;
        for (band, &count) in BAND_BOXES.iter().enumerate() {
            end += count;
            if box_index < end {
                return Some(band);
            }
        }
        None
    }
}

impl Partition for EqualAreaGrid {
    fn regions(&self) -> Vec<Region> {
        self.boxes()
            .into_iter()
            .map(|extent| Region {
                cells: self.cells(&extent),
                extent,
            })
            .collect()
    }
}

/// Weight of a station at `location` for a cell centred at `centre`, both (lat, lon) in
/// degrees, or `None` if the station is not within `arc` radians of the centre.
///
/// The weight falls linearly with the chord distance, from 1 at the centre to about 0 at the
/// edge of the circle.
pub fn incircle(arc: f64, centre: (f64, f64), location: (f64, f64)) -> Option<f64> {
    let (c_lat, c_lon) = (centre.0.to_radians(), centre.1.to_radians());
    let (s_lat, s_lon) = (location.0.to_radians(), location.1.to_radians());

    let cos_dist = s_lat.sin() * c_lat.sin() + s_lat.cos() * c_lat.cos() * (s_lon - c_lon).cos();
    if cos_dist <= arc.cos() {
        return None;
    }

    let chord = (2.0 * (1.0 - cos_dist)).max(0.0).sqrt();
    Some(1.0 - chord / arc)
}

/// Convert an angle of arc in radians to degrees.
#[inline]
pub(crate) fn arc_degrees(arc: f64) -> f64 {
    arc * 180.0 / PI
}
