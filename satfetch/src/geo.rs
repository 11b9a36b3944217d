//! Geographic primitives for areas of interest.
//!
//! Coordinates are WGS84 degrees, longitude first.

use std::fmt;

/// Axis-aligned rectangle in lon/lat degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Rect {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon: min_lon.min(max_lon),
            min_lat: min_lat.min(max_lat),
            max_lon: min_lon.max(max_lon),
            max_lat: min_lat.max(max_lat),
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    /// Closed ring of the rectangle's corners.
    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(vec![
            (self.min_lon, self.min_lat),
            (self.max_lon, self.min_lat),
            (self.max_lon, self.max_lat),
            (self.min_lon, self.max_lat),
            (self.min_lon, self.min_lat),
        ])
    }
}

/// Simple polygon given by its outer ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<(f64, f64)>,
}

impl Polygon {
    /// Build a polygon, closing the ring if the last point differs from the first.
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
            if first != last {
                points.push(first);
            }
        }
        Self { points }
    }

    /// Parse `lon lat, lon lat, ...` or a `POLYGON((...))` WKT string.
    pub fn parse(text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        let body = trimmed
            .strip_prefix("POLYGON")
            .map(|rest| rest.trim().trim_start_matches('(').trim_end_matches(')'))
            .unwrap_or(trimmed);

        let points = body
            .split(',')
            .map(|pair| {
                let mut coords = pair.split_whitespace().map(str::parse::<f64>);
                match (coords.next(), coords.next(), coords.next()) {
                    (Some(Ok(lon)), Some(Ok(lat)), None) => Ok((lon, lat)),
                    _ => Err(format!("invalid coordinate pair: '{}'", pair.trim())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if points.len() < 3 {
            return Err(format!("a polygon needs at least 3 points, got {}", points.len()));
        }
        Ok(Self::new(points))
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn bounding_box(&self) -> Rect {
        let mut rect = Rect {
            min_lon: f64::MAX,
            min_lat: f64::MAX,
            max_lon: f64::MIN,
            max_lat: f64::MIN,
        };
        for &(lon, lat) in &self.points {
            rect.min_lon = rect.min_lon.min(lon);
            rect.min_lat = rect.min_lat.min(lat);
            rect.max_lon = rect.max_lon.max(lon);
            rect.max_lat = rect.max_lat.max(lat);
        }
        rect
    }

    /// Well-known-text rendering used in catalog footprint filters.
    pub fn to_wkt(&self) -> String {
        let ring = self
            .points
            .iter()
            .map(|(lon, lat)| format!("{} {}", lon, lat))
            .collect::<Vec<_>>()
            .join(",");
        format!("POLYGON(({}))", ring)
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wkt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersects() {
        let a = Rect::new(0.0, 0.0, 2.0, 2.0);
        assert!(a.intersects(&Rect::new(1.0, 1.0, 3.0, 3.0)));
        assert!(!a.intersects(&Rect::new(2.5, 2.5, 3.0, 3.0)));
    }

    #[test]
    fn test_rect_new_orders_corners() {
        let r = Rect::new(2.0, 3.0, 1.0, 0.0);
        assert_eq!(r, Rect::new(1.0, 0.0, 2.0, 3.0));
    }

    #[test]
    fn test_polygon_closes_ring() {
        let p = Polygon::new(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(p.points().len(), 4);
        assert_eq!(p.points()[0], p.points()[3]);
    }

    #[test]
    fn test_polygon_parse_and_wkt() {
        let p = Polygon::parse("23.5 41.5, 24.5 41.5, 24.5 42.5, 23.5 42.5").unwrap();
        assert_eq!(
            p.to_wkt(),
            "POLYGON((23.5 41.5,24.5 41.5,24.5 42.5,23.5 42.5,23.5 41.5))"
        );
        let again = Polygon::parse(&p.to_wkt()).unwrap();
        assert_eq!(again, p);
    }

    #[test]
    fn test_polygon_parse_errors() {
        assert!(Polygon::parse("1 2, 3 4").is_err());
        assert!(Polygon::parse("1 2, 3 x, 5 6").is_err());
    }

    #[test]
    fn test_polygon_bounding_box() {
        let p = Polygon::parse("1 5, 3 2, 2 7").unwrap();
        assert_eq!(p.bounding_box(), Rect::new(1.0, 2.0, 3.0, 7.0));
    }
}
