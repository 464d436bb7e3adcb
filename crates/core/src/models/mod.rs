#![allow(missing_docs)]

//! Shared domain models.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Position on the reference map image, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Distance from this point to the closed segment `a`..`b`.
    pub fn distance_to_segment(&self, a: Point, b: Point) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq <= f64::EPSILON {
            return self.distance_to(a);
        }
        let t = (((self.x - a.x) * dx + (self.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
        self.distance_to(Point::new(a.x + t * dx, a.y + t * dy))
    }
}

/// A named city with its map coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct City {
    pub name: String,
    pub position: Point,
}

/// A single track segment between two cities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub from: String,
    pub to: String,
    pub length: u32,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub tunnel: bool,
    #[serde(default)]
    pub ferry: u32,
}

/// A scored destination objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub index: usize,
    pub from: String,
    pub to: String,
    pub points: u32,
    #[serde(default)]
    pub is_long: bool,
}

/// Reference data for one session: cities, segments, tickets and segment scoring.
///
/// Cities keep the order in which the data endpoint delivered them; that order
/// is the calibration walk order.
#[derive(Debug, Clone, Default)]
pub struct GameData {
    cities: Vec<City>,
    city_lookup: HashMap<String, usize>,
    segments: Vec<Segment>,
    segment_lookup: HashMap<usize, usize>,
    tickets: Vec<Ticket>,
    ticket_lookup: HashMap<usize, usize>,
    scoring: BTreeMap<u32, u32>,
}

impl GameData {
    pub fn new(
        cities: Vec<City>,
        segments: Vec<Segment>,
        tickets: Vec<Ticket>,
        scoring: BTreeMap<u32, u32>,
    ) -> Self {
        let city_lookup = cities
            .iter()
            .enumerate()
            .map(|(pos, city)| (city.name.clone(), pos))
            .collect();
        let segment_lookup = segments
            .iter()
            .enumerate()
            .map(|(pos, segment)| (segment.index, pos))
            .collect();
        let ticket_lookup = tickets
            .iter()
            .enumerate()
            .map(|(pos, ticket)| (ticket.index, pos))
            .collect();
        Self {
            cities,
            city_lookup,
            segments,
            segment_lookup,
            tickets,
            ticket_lookup,
            scoring,
        }
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn city(&self, name: &str) -> Option<&City> {
        self.city_lookup.get(name).map(|&pos| &self.cities[pos])
    }

    pub fn position_of(&self, name: &str) -> Option<Point> {
        self.city(name).map(|city| city.position)
    }

    /// Look up a segment by its `index` field (not its slice position).
    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segment_lookup.get(&index).map(|&pos| &self.segments[pos])
    }

    /// Look a ticket up by its `index` field, not its position.
    pub fn ticket(&self, index: usize) -> Option<&Ticket> {
        self.ticket_lookup.get(&index).map(|&pos| &self.tickets[pos])
    }

    /// Route points awarded for claiming a segment of the given length.
    pub fn points_for_length(&self, length: u32) -> u32 {
        self.scoring.get(&length).copied().unwrap_or(0)
    }

    /// Names of all cities in walk order.
    pub fn city_names(&self) -> Vec<String> {
        self.cities.iter().map(|city| city.name.clone()).collect()
    }

    /// Bounding box of every city coordinate, or `None` without cities.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = self.cities.first()?.position;
        let (min, max) = self.cities.iter().fold((first, first), |(min, max), city| {
            (
                Point::new(min.x.min(city.position.x), min.y.min(city.position.y)),
                Point::new(max.x.max(city.position.x), max.y.max(city.position.y)),
            )
        });
        Some((min, max))
    }
}

/// Ticket echoed back by the solver for the solved objectives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketSummary {
    pub from: String,
    pub to: String,
    pub points: u32,
    #[serde(default)]
    pub is_long: bool,
}

/// One chosen segment inside a solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionEdge {
    pub from: String,
    pub to: String,
    pub length: u32,
    #[serde(default)]
    pub points: u32,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub tunnel: bool,
    #[serde(default)]
    pub ferry: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_index: Option<i64>,
}

/// One alternative route plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub label: String,
    #[serde(default)]
    pub total_cars: u32,
    #[serde(default)]
    pub total_points: u32,
    #[serde(default)]
    pub edges: Vec<SolutionEdge>,
}

/// Full solver response: alternatives plus the terminals they share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionSet {
    #[serde(default)]
    pub selected_tickets: Vec<TicketSummary>,
    #[serde(default)]
    pub terminals: Vec<String>,
    pub solutions: Vec<Solution>,
}

impl SolutionSet {
    /// Sum of the points of every solved ticket.
    pub fn ticket_points(&self) -> u32 {
        self.selected_tickets
            .iter()
            .fold(0u32, |total, ticket| total.saturating_add(ticket.points))
    }
}

fn default_color() -> String {
    "gray".to_string()
}

/// Deserialize a JSON object of `name -> {x, y}` into cities, keeping document order.
pub(crate) fn deserialize_cities<'de, D>(deserializer: D) -> Result<Vec<City>, D::Error>
where
    D: Deserializer<'de>,
{
    struct CitiesVisitor;

    impl<'de> Visitor<'de> for CitiesVisitor {
        type Value = Vec<City>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of city names to {x, y} coordinates")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut cities: Vec<City> = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, position)) = map.next_entry::<String, Point>()? {
                if cities.iter().any(|city| city.name == name) {
                    return Err(de::Error::custom(format!("duplicate city '{name}'")));
                }
                cities.push(City { name, position });
            }
            Ok(cities)
        }
    }

    deserializer.deserialize_map(CitiesVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(index: usize, from: &str, to: &str) -> Segment {
        Segment {
            index,
            from: from.to_string(),
            to: to.to_string(),
            length: 2,
            color: "red".to_string(),
            tunnel: false,
            ferry: 0,
        }
    }

    #[test]
    fn point_distance_to_segment_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert_eq!(Point::new(5.0, 3.0).distance_to_segment(a, b), 3.0);
        assert_eq!(Point::new(-4.0, 3.0).distance_to_segment(a, b), 5.0);
        assert_eq!(Point::new(2.0, 2.0).distance_to_segment(a, a), 8f64.sqrt());
    }

    #[test]
    fn segment_lookup_uses_index_field() {
        let data = GameData::new(
            vec![],
            vec![segment(7, "A", "B"), segment(3, "B", "A")],
            vec![],
            BTreeMap::new(),
        );
        assert_eq!(data.segment(3).map(|s| s.from.as_str()), Some("B"));
        assert!(data.segment(0).is_none());
    }

    #[test]
    fn ticket_lookup_uses_index_field() {
        let ticket = |index: usize, from: &str| Ticket {
            index,
            from: from.to_string(),
            to: "Z".to_string(),
            points: 5,
            is_long: false,
        };
        let data = GameData::new(
            vec![],
            vec![],
            vec![ticket(4, "A"), ticket(1, "B")],
            BTreeMap::new(),
        );
        assert_eq!(data.ticket(1).map(|t| t.from.as_str()), Some("B"));
        assert_eq!(data.ticket(4).map(|t| t.from.as_str()), Some("A"));
        assert!(data.ticket(0).is_none());
    }

    #[test]
    fn bounds_cover_all_cities() {
        let data = GameData::new(
            vec![
                City {
                    name: "A".to_string(),
                    position: Point::new(4.0, 9.0),
                },
                City {
                    name: "B".to_string(),
                    position: Point::new(-1.0, 20.0),
                },
            ],
            vec![],
            vec![],
            BTreeMap::new(),
        );
        let (min, max) = data.bounds().expect("bounds");
        assert_eq!(min, Point::new(-1.0, 9.0));
        assert_eq!(max, Point::new(4.0, 20.0));
        assert!(GameData::default().bounds().is_none());
    }

    #[test]
    fn cities_keep_document_order() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(deserialize_with = "deserialize_cities")]
            cities: Vec<City>,
        }

        let wrapper: Wrapper = serde_json::from_str(
            r#"{"cities": {"Zurich": {"x": 1, "y": 2}, "Amsterdam": {"x": 3.5, "y": 4}}}"#,
        )
        .expect("parse cities");
        let names: Vec<_> = wrapper.cities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Zurich", "Amsterdam"]);
        assert_eq!(wrapper.cities[1].position, Point::new(3.5, 4.0));
    }
}
