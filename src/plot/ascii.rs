//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks of residuals in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - samples: `o`
//! - model overlay: `-` line

use crate::domain::ResidualSeries;

/// Plot a residual series, optionally overlaid with a model evaluated on
/// the same z grid.
pub fn render_residual_plot<F: Fn(f64) -> f64>(
    residual: &ResidualSeries,
    model: Option<F>,
    width: usize,
    height: usize,
) -> String {
    let points: Vec<(f64, f64)> = residual
        .z()
        .iter()
        .zip(residual.values())
        .map(|(&z, &v)| (z, v))
        .collect();
    let curve = model.map(|f| sample_curve(&f, &points, width.max(2)));
    render_plot(&points, curve.as_deref(), width, height)
}

/// Plot arbitrary `(z, value)` samples with an optional overlay curve.
pub fn render_plot(points: &[(f64, f64)], curve_points: Option<&[(f64, f64)]>, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (z_min, z_max) = z_range(points, curve_points).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = y_range(points, curve_points).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    if let Some(curve) = curve_points {
        draw_curve(&mut grid, curve, z_min, z_max, y_min, y_max);
    }

    for &(z, y) in points {
        if !y.is_finite() {
            continue;
        }
        let x = map_x(z, z_min, z_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][x] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!("Plot: z=[{z_min:.3}, {z_max:.3}] | y=[{y_min:.4}, {y_max:.4}]\n"));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn z_range(points: &[(f64, f64)], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_z = f64::INFINITY;
    let mut max_z = f64::NEG_INFINITY;
    for &(z, _) in points.iter().chain(curve.unwrap_or(&[])) {
        min_z = min_z.min(z);
        max_z = max_z.max(z);
    }
    if min_z.is_finite() && max_z.is_finite() && max_z > min_z {
        Some((min_z, max_z))
    } else {
        None
    }
}

fn sample_curve<F: Fn(f64) -> f64>(f: &F, points: &[(f64, f64)], n: usize) -> Vec<(f64, f64)> {
    let (Some(&(z0, _)), Some(&(z1, _))) = (points.first(), points.last()) else {
        return Vec::new();
    };
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let z = z0 + u * (z1 - z0);
            (z, f(z))
        })
        .collect()
}

fn y_range(points: &[(f64, f64)], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in points.iter().chain(curve.unwrap_or(&[])) {
        if y.is_finite() {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(z: f64, z_min: f64, z_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((z - z_min) / (z_max - z_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], z_min: f64, z_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(z, y) in curve {
        let x = map_x(z, z_min, z_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let series = ResidualSeries::new(vec![1.0, 10.0], vec![100.0, 110.0], 0.0);
        let txt = render_residual_plot(&series, Some(|_z: f64| 100.0), 10, 5);
        let expected = concat!(
            "Plot: z=[1.000, 10.000] | y=[99.5000, 110.5000]\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn plot_without_overlay_has_only_points() {
        let series = ResidualSeries::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.0], 0.0);
        let txt = render_residual_plot(&series, None::<fn(f64) -> f64>, 12, 6);
        assert!(txt.lines().skip(1).all(|l| !l.contains('-')));
        let points: usize = txt.lines().skip(1).map(|l| l.matches('o').count()).sum();
        assert_eq!(points, 3);
    }
}
