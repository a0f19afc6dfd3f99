//! Radar chart of the six rubric stages.
//!
//! Rendering is pure: the same values and title always produce the same SVG
//! document, so charts can be snapshot-compared and cached by callers.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt::Write;

use crate::aggregation::AverageScores;
use crate::rubric::{RubricScoreSet, Stage, MAX_SCORE};

/// Canvas width and height in SVG user units.
pub const CANVAS_SIZE: f64 = 480.0;
/// Radius of the outer ring (score 10).
pub const RADIUS: f64 = 160.0;
const CENTER: f64 = CANVAS_SIZE / 2.0;
const FILL_COLOR: &str = "#FF4B4B";
const GRID_COLOR: &str = "#CCCCCC";
/// Radial offset, in score units, between a vertex and its value label.
const LABEL_OFFSET: f64 = 0.5;

/// Six values in stage order, on the 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageValues(pub [f64; 6]);

impl From<&RubricScoreSet> for StageValues {
    fn from(scores: &RubricScoreSet) -> Self {
        StageValues(scores.to_array().map(f64::from))
    }
}

impl From<RubricScoreSet> for StageValues {
    fn from(scores: RubricScoreSet) -> Self {
        StageValues::from(&scores)
    }
}

impl From<&AverageScores> for StageValues {
    fn from(averages: &AverageScores) -> Self {
        StageValues(averages.to_array())
    }
}

impl From<AverageScores> for StageValues {
    fn from(averages: AverageScores) -> Self {
        StageValues::from(&averages)
    }
}

/// One spoke of the radar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarAxis {
    pub stage: Stage,
    /// Clockwise angle from the top, in radians.
    pub angle: f64,
    pub value: f64,
    /// Vertex position of `value` on this spoke.
    pub x: f64,
    pub y: f64,
    /// Where the value label sits, just outside the vertex.
    pub label_x: f64,
    pub label_y: f64,
}

/// A rendered radar chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartImage {
    pub title: String,
    pub axes: Vec<RadarAxis>,
    /// Closed polygon: the first vertex is repeated at the end.
    pub polygon: Vec<(f64, f64)>,
    pub svg: String,
}

fn angle_for(index: usize) -> f64 {
    index as f64 / Stage::ALL.len() as f64 * 2.0 * PI
}

/// Canvas point at `value` (0-10) on the spoke at `angle`.
fn point(angle: f64, value: f64) -> (f64, f64) {
    let r = value.clamp(0.0, f64::from(MAX_SCORE)) / f64::from(MAX_SCORE) * RADIUS;
    (round2(CENTER + r * angle.sin()), round2(CENTER - r * angle.cos()))
}

/// Label position for `value`: the vertex pushed [`LABEL_OFFSET`] outward.
fn label_point(angle: f64, value: f64) -> (f64, f64) {
    let scale = f64::from(MAX_SCORE);
    let r = (value.clamp(0.0, scale) + LABEL_OFFSET) / scale * RADIUS;
    (round2(CENTER + r * angle.sin()), round2(CENTER - r * angle.cos()))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn points_attr(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{},{}", x, y))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a radar chart over the six stages.
///
/// The first stage sits at the top and the rest follow clockwise. Values
/// outside 0-10 are clamped for drawing but reported unchanged on the axes.
pub fn render_radar(values: impl Into<StageValues>, title: &str) -> ChartImage {
    let StageValues(values) = values.into();

    let axes: Vec<RadarAxis> = Stage::ALL
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (stage, value))| {
            let angle = angle_for(i);
            let (x, y) = point(angle, value);
            let (label_x, label_y) = label_point(angle, value);
            RadarAxis {
                stage: *stage,
                angle,
                value,
                x,
                y,
                label_x,
                label_y,
            }
        })
        .collect();

    let mut polygon: Vec<(f64, f64)> = axes.iter().map(|a| (a.x, a.y)).collect();
    if let Some(first) = polygon.first().copied() {
        polygon.push(first);
    }

    let svg = build_svg(title, &axes, &polygon);

    ChartImage {
        title: title.to_string(),
        axes,
        polygon,
        svg,
    }
}

fn build_svg(title: &str, axes: &[RadarAxis], polygon: &[(f64, f64)]) -> String {
    let mut svg = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}">"#,
        size = CANVAS_SIZE
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="28" text-anchor="middle" font-size="18" font-weight="bold">{}</text>"#,
        CENTER,
        escape_xml(title)
    );

    for ring in [2.0, 4.0, 6.0, 8.0, 10.0] {
        let ring_points: Vec<(f64, f64)> = (0..Stage::ALL.len())
            .map(|i| point(angle_for(i), ring))
            .chain(std::iter::once(point(0.0, ring)))
            .collect();
        let _ = writeln!(
            svg,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="1"/>"#,
            points_attr(&ring_points),
            GRID_COLOR
        );
    }

    for axis in axes {
        let (x, y) = point(axis.angle, f64::from(MAX_SCORE));
        let _ = writeln!(
            svg,
            r#"<line x1="{c}" y1="{c}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            x,
            y,
            GRID_COLOR,
            c = CENTER
        );
        let (cx, cy) = point(axis.angle, 11.5);
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="12">{}</text>"#,
            cx,
            cy,
            escape_xml(axis.stage.label())
        );
    }

    let _ = writeln!(
        svg,
        r#"<polygon points="{}" fill="{color}" fill-opacity="0.5" stroke="{color}" stroke-width="2"/>"#,
        points_attr(polygon),
        color = FILL_COLOR
    );

    // Values go on top of the polygon so the fill never hides them.
    for axis in axes {
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="11" font-weight="bold">{}</text>"#,
            axis.label_x,
            axis.label_y,
            format_value(axis.value)
        );
    }
    svg.push_str("</svg>\n");
    svg
}
