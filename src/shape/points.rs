//! Base point sets for presets and the reference circle.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, FRAC_PI_6, PI, TAU};

use super::Point;
use crate::params::Preset;

/// Generate the base point sequence for a preset
///
/// Polygons have their points spread along the edges so that every preset
/// yields `num_points` points and can be morphed against the circle.
///
/// # Arguments
/// * `preset` - Shape kind
/// * `center` - Shape center
/// * `radius` - Circumradius (vertex distance from center)
/// * `num_points` - Length of the returned sequence
pub fn generate_points(preset: Preset, center: Point, radius: f32, num_points: usize) -> Vec<Point> {
    match preset {
        Preset::Circle => generate_circle_points(center, radius, num_points),
        Preset::Triangle => {
            let vertices = [
                Point::new(center.x, center.y - radius), // top
                center + Point::new(FRAC_PI_6.cos(), FRAC_PI_6.sin()) * radius, // bottom right
                center + Point::new(-FRAC_PI_6.cos(), FRAC_PI_6.sin()) * radius, // bottom left
            ];
            distribute_along_polygon(&vertices, num_points)
        }
        Preset::Square => {
            // Rotated 45 degrees so flat edges face up, down, left and right
            let vertices: Vec<Point> = (0..4)
                .map(|k| {
                    let angle = -FRAC_PI_4 + k as f32 * FRAC_PI_2;
                    center + Point::new(angle.cos(), angle.sin()) * radius
                })
                .collect();
            distribute_along_polygon(&vertices, num_points)
        }
    }
}

/// Evenly spaced circle points starting at the top, clockwise in screen space
pub fn generate_circle_points(center: Point, radius: f32, num_points: usize) -> Vec<Point> {
    (0..num_points)
        .map(|i| {
            let angle = (i as f32 / num_points as f32) * TAU - PI / 2.0;
            center + Point::new(angle.cos(), angle.sin()) * radius
        })
        .collect()
}

/// Points allotted to each edge; the remainder goes to the first edges
pub fn distribute_edge_points(num_points: usize, num_edges: usize) -> Vec<usize> {
    if num_edges == 0 {
        return Vec::new();
    }
    let per_edge = num_points / num_edges;
    let remainder = num_points % num_edges;
    (0..num_edges)
        .map(|i| per_edge + usize::from(i < remainder))
        .collect()
}

/// Sample each edge from its first vertex, excluding its end vertex
fn distribute_along_polygon(vertices: &[Point], num_points: usize) -> Vec<Point> {
    let allocation = distribute_edge_points(num_points, vertices.len());
    let mut points = Vec::with_capacity(num_points);

    for (i, &edge_points) in allocation.iter().enumerate() {
        let start = vertices[i];
        let end = vertices[(i + 1) % vertices.len()];

        for j in 0..edge_points {
            let t = j as f32 / edge_points as f32;
            points.push(start.lerp(end, t));
        }
    }

    points
}
