#![allow(missing_docs)]

//! Solution layer and the results panel model.

use tracing::debug;

use super::scene::{
    Layer, Primitive, Rgb, StrokeKind, GLOW_OPACITY, GLOW_WIDTH, SOLID_WIDTH,
};
use crate::models::{GameData, SolutionEdge, SolutionSet};

/// Colors of the first, second and third alternatives.
pub const SOLUTION_COLORS: [Rgb; 3] = [
    Rgb::from_hex(0x00ff88),
    Rgb::from_hex(0xffaa00),
    Rgb::from_hex(0x00bbff),
];

/// Color for an alternative by rank; ranks past the palette reuse the first color.
pub fn alternative_color(index: usize) -> Rgb {
    SOLUTION_COLORS
        .get(index)
        .copied()
        .unwrap_or(SOLUTION_COLORS[0])
}

/// Swatch for a named train color.
pub fn segment_color(name: &str) -> Rgb {
    match name {
        "red" => Rgb::from_hex(0xe74c3c),
        "blue" => Rgb::from_hex(0x3498db),
        "green" => Rgb::from_hex(0x2ecc71),
        "yellow" => Rgb::from_hex(0xf1c40f),
        "black" => Rgb::from_hex(0x2c3e50),
        "white" => Rgb::from_hex(0xecf0f1),
        "orange" => Rgb::from_hex(0xe67e22),
        "pink" => Rgb::from_hex(0xe91e8a),
        _ => Rgb::from_hex(0x95a5a6),
    }
}

/// Draws the active alternative; never touches the interaction layer.
#[derive(Debug, Default)]
pub struct SolutionRenderer {
    layer: Layer,
    drawn: Option<usize>,
}

impl SolutionRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    /// Alternative currently on the layer, if any.
    pub fn drawn_alternative(&self) -> Option<usize> {
        self.drawn
    }

    pub fn clear(&mut self) {
        self.layer.clear();
        self.drawn = None;
    }

    /// Clear the layer and draw alternative `index` of `set`.
    ///
    /// Each edge becomes a glow stroke under a solid stroke; every shared terminal
    /// gets a filled marker. Edges or terminals naming unknown cities are skipped.
    pub fn draw(&mut self, data: &GameData, set: &SolutionSet, index: usize) {
        self.clear();
        let Some(solution) = set.solutions.get(index) else {
            return;
        };
        let color = alternative_color(index);

        for edge in &solution.edges {
            let (Some(from), Some(to)) = (data.position_of(&edge.from), data.position_of(&edge.to))
            else {
                debug!(from = %edge.from, to = %edge.to, "Skipping edge with unknown city");
                continue;
            };
            self.layer.push(Primitive::Stroke {
                kind: StrokeKind::Glow,
                from,
                to,
                color,
                width: GLOW_WIDTH,
                opacity: GLOW_OPACITY,
            });
            self.layer.push(Primitive::Stroke {
                kind: StrokeKind::Solid,
                from,
                to,
                color,
                width: SOLID_WIDTH,
                opacity: 1.0,
            });
        }

        for name in &set.terminals {
            let Some(at) = data.position_of(name) else {
                continue;
            };
            self.layer.push(Primitive::TerminalMarker {
                name: name.clone(),
                at,
                color,
            });
        }
        self.drawn = Some(index);
    }
}

/// One tab per alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionTab {
    pub label: String,
    pub active: bool,
    pub color: Rgb,
}

pub fn solution_tabs(set: &SolutionSet, active: usize) -> Vec<SolutionTab> {
    set.solutions
        .iter()
        .enumerate()
        .map(|(i, solution)| SolutionTab {
            label: solution.label.clone(),
            active: i == active,
            color: alternative_color(i),
        })
        .collect()
}

/// A chosen edge as listed in the details panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRow {
    pub from: String,
    pub to: String,
    pub length: u32,
    pub points: u32,
    pub color: Rgb,
    pub tunnel: bool,
    pub ferry: u32,
}

impl EdgeRow {
    /// Edges the solver sent without points are scored from the length table.
    fn from_edge(edge: &SolutionEdge, data: &GameData) -> Self {
        let points = if edge.points > 0 {
            edge.points
        } else {
            data.points_for_length(edge.length)
        };
        Self {
            from: edge.from.clone(),
            to: edge.to.clone(),
            length: edge.length,
            points,
            color: segment_color(&edge.color),
            tunnel: edge.tunnel,
            ferry: edge.ferry,
        }
    }

    /// `3 cars | 4 pts | Tunnel | Ferry(1)`
    pub fn info(&self) -> String {
        let mut info = format!("{} cars | {} pts", self.length, self.points);
        if self.tunnel {
            info.push_str(" | Tunnel");
        }
        if self.ferry > 0 {
            info.push_str(&format!(" | Ferry({})", self.ferry));
        }
        info
    }
}

/// Summary figures and edge list for one alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionDetails {
    pub label: String,
    pub total_cars: u32,
    pub route_points: u32,
    pub ticket_points: u32,
    pub grand_total: u32,
    pub edges: Vec<EdgeRow>,
}

/// Details for alternative `index`, edges longest first.
///
/// Sorting is stable and works on a copy; the solution set itself is untouched.
pub fn solution_details(
    data: &GameData,
    set: &SolutionSet,
    index: usize,
) -> Option<SolutionDetails> {
    let solution = set.solutions.get(index)?;
    let ticket_points = set.ticket_points();
    let mut edges: Vec<EdgeRow> = solution
        .edges
        .iter()
        .map(|edge| EdgeRow::from_edge(edge, data))
        .collect();
    edges.sort_by(|a, b| b.length.cmp(&a.length));
    Some(SolutionDetails {
        label: solution.label.clone(),
        total_cars: solution.total_cars,
        route_points: solution.total_points,
        ticket_points,
        grand_total: solution.total_points.saturating_add(ticket_points),
        edges,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::{City, Point, Solution, TicketSummary};

    fn edge(from: &str, to: &str, length: u32) -> SolutionEdge {
        SolutionEdge {
            from: from.to_string(),
            to: to.to_string(),
            length,
            points: length * 2,
            color: "blue".to_string(),
            tunnel: false,
            ferry: 0,
            route_index: None,
        }
    }

    fn data() -> GameData {
        let cities = [("A", 0.0), ("B", 10.0), ("C", 20.0), ("D", 30.0)]
            .iter()
            .map(|(name, x)| City {
                name: name.to_string(),
                position: Point::new(*x, 5.0),
            })
            .collect();
        GameData::new(cities, vec![], vec![], BTreeMap::new())
    }

    fn three_alternatives() -> SolutionSet {
        SolutionSet {
            selected_tickets: vec![
                TicketSummary {
                    from: "A".to_string(),
                    to: "D".to_string(),
                    points: 11,
                    is_long: true,
                },
                TicketSummary {
                    from: "B".to_string(),
                    to: "C".to_string(),
                    points: 4,
                    is_long: false,
                },
            ],
            terminals: vec!["A".to_string(), "D".to_string(), "Atlantis".to_string()],
            solutions: vec![
                Solution {
                    label: "Main".to_string(),
                    total_cars: 3,
                    total_points: 4,
                    edges: vec![edge("A", "B", 3)],
                },
                Solution {
                    label: "Alt 1".to_string(),
                    total_cars: 5,
                    total_points: 9,
                    edges: vec![edge("A", "C", 5)],
                },
                Solution {
                    label: "Alt 2".to_string(),
                    total_cars: 9,
                    total_points: 15,
                    edges: vec![edge("A", "B", 2), edge("B", "Gone", 1), edge("C", "D", 4)],
                },
            ],
        }
    }

    #[test]
    fn palette_falls_back_to_first_color() {
        assert_eq!(alternative_color(2), Rgb::from_hex(0x00bbff));
        assert_eq!(alternative_color(3), SOLUTION_COLORS[0]);
        assert_eq!(segment_color("purple"), segment_color("gray"));
    }

    #[test]
    fn drawing_third_alternative_uses_third_color() {
        let data = data();
        let set = three_alternatives();
        let mut renderer = SolutionRenderer::new();
        renderer.draw(&data, &set, 0);
        renderer.draw(&data, &set, 2);

        assert_eq!(renderer.drawn_alternative(), Some(2));
        let third = SOLUTION_COLORS[2];
        let strokes: Vec<_> = renderer
            .layer()
            .primitives()
            .iter()
            .filter_map(|p| match p {
                Primitive::Stroke { kind, color, .. } => Some((*kind, *color)),
                _ => None,
            })
            .collect();
        // Edge to "Gone" is skipped: two edges, two strokes each.
        assert_eq!(
            strokes,
            vec![
                (StrokeKind::Glow, third),
                (StrokeKind::Solid, third),
                (StrokeKind::Glow, third),
                (StrokeKind::Solid, third),
            ]
        );
        let terminals: Vec<_> = renderer
            .layer()
            .primitives()
            .iter()
            .filter_map(|p| match p {
                Primitive::TerminalMarker { name, color, .. } => Some((name.as_str(), *color)),
                _ => None,
            })
            .collect();
        assert_eq!(terminals, vec![("A", third), ("D", third)]);
    }

    #[test]
    fn out_of_range_alternative_leaves_layer_empty() {
        let mut renderer = SolutionRenderer::new();
        renderer.draw(&data(), &three_alternatives(), 5);
        assert!(renderer.layer().is_empty());
        assert_eq!(renderer.drawn_alternative(), None);
    }

    #[test]
    fn details_sort_edges_by_length_stably() {
        let mut set = three_alternatives();
        set.solutions[2].edges.push(edge("D", "A", 4));
        let details = solution_details(&data(), &set, 2).expect("details");

        let order: Vec<_> = details
            .edges
            .iter()
            .map(|e| (e.from.as_str(), e.length))
            .collect();
        assert_eq!(order, vec![("C", 4), ("D", 4), ("A", 2), ("B", 1)]);
        assert_eq!(details.ticket_points, 15);
        assert_eq!(details.grand_total, 30);
        assert_eq!(set.solutions[2].edges[0].from, "A");
    }

    #[test]
    fn edge_info_mentions_tunnel_and_ferry() {
        let mut e = edge("A", "B", 3);
        e.tunnel = true;
        e.ferry = 2;
        assert_eq!(
            EdgeRow::from_edge(&e, &data()).info(),
            "3 cars | 6 pts | Tunnel | Ferry(2)"
        );
    }

    #[test]
    fn missing_edge_points_come_from_scoring_table() {
        let scoring = BTreeMap::from([(3, 4), (6, 15)]);
        let data = GameData::new(vec![], vec![], vec![], scoring);
        let mut set = three_alternatives();
        set.solutions[0].edges = vec![edge("A", "B", 3), edge("B", "C", 6)];
        set.solutions[0].edges[0].points = 0;
        set.solutions[0].edges[1].points = 0;

        let details = solution_details(&data, &set, 0).expect("details");
        let points: Vec<_> = details.edges.iter().map(|e| e.points).collect();
        assert_eq!(points, vec![15, 4]);
        assert_eq!(edge_points(&details, "A"), Some(4));
    }

    #[test]
    fn oversized_totals_saturate() {
        let mut set = three_alternatives();
        set.solutions[0].total_points = u32::MAX;
        set.selected_tickets[0].points = u32::MAX;
        let details = solution_details(&data(), &set, 0).expect("details");
        assert_eq!(details.ticket_points, u32::MAX);
        assert_eq!(details.grand_total, u32::MAX);
    }

    fn edge_points(details: &SolutionDetails, from: &str) -> Option<u32> {
        details
            .edges
            .iter()
            .find(|e| e.from == from)
            .map(|e| e.points)
    }

    #[test]
    fn tabs_mark_active_alternative() {
        let tabs = solution_tabs(&three_alternatives(), 1);
        let active: Vec<_> = tabs.iter().map(|t| t.active).collect();
        assert_eq!(active, vec![false, true, false]);
        assert_eq!(tabs[1].label, "Alt 1");
    }
}
