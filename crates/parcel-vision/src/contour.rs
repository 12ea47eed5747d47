//! Binary mask components and outline geometry

use std::collections::VecDeque;

/// Row-major binary mask
#[derive(Debug, Clone)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl Mask {
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x]
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// Inclusive pixel bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl BoundingBox {
    fn at(x: usize, y: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> usize {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    /// Intersection over union
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix0 = self.min_x.max(other.min_x);
        let iy0 = self.min_y.max(other.min_y);
        let ix1 = self.max_x.min(other.max_x);
        let iy1 = self.max_y.min(other.max_y);
        if ix0 > ix1 || iy0 > iy1 {
            return 0.0;
        }
        let inter = ((ix1 - ix0 + 1) * (iy1 - iy0 + 1)) as f64;
        let union = (self.area() + other.area()) as f64 - inter;
        inter / union
    }
}

/// 8-connected component of set pixels
#[derive(Debug, Clone)]
pub struct Component {
    /// Row-major pixel indices into the source mask
    pub pixels: Vec<usize>,
    pub bbox: BoundingBox,
}

impl Component {
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Area enclosed by the component: its bounding box minus everything
    /// reachable from outside without crossing a component pixel.
    pub fn filled_area(&self, mask_width: usize) -> usize {
        // One pixel of padding so the outside region is connected
        let w = self.bbox.width() + 2;
        let h = self.bbox.height() + 2;
        let mut wall = vec![false; w * h];
        for &idx in &self.pixels {
            let x = idx % mask_width - self.bbox.min_x + 1;
            let y = idx / mask_width - self.bbox.min_y + 1;
            wall[y * w + x] = true;
        }

        // 4-connected flood from the padded corner; an 8-connected outline
        // cannot be crossed this way
        let mut outside = vec![false; w * h];
        let mut queue = VecDeque::new();
        outside[0] = true;
        queue.push_back(0usize);
        let mut reached = 0usize;

        while let Some(idx) = queue.pop_front() {
            reached += 1;
            let x = idx % w;
            let y = idx / w;
            let mut visit = |nx: usize, ny: usize| {
                let n = ny * w + nx;
                if !wall[n] && !outside[n] {
                    outside[n] = true;
                    queue.push_back(n);
                }
            };
            if x > 0 {
                visit(x - 1, y);
            }
            if x + 1 < w {
                visit(x + 1, y);
            }
            if y > 0 {
                visit(x, y - 1);
            }
            if y + 1 < h {
                visit(x, y + 1);
            }
        }

        w * h - reached
    }

    /// Leftmost and rightmost pixel of every row; enough to build the hull
    pub fn row_extremes(&self, mask_width: usize) -> Vec<(f64, f64)> {
        let rows = self.bbox.height();
        let mut extremes: Vec<Option<(usize, usize)>> = vec![None; rows];
        for &idx in &self.pixels {
            let x = idx % mask_width;
            let row = idx / mask_width - self.bbox.min_y;
            extremes[row] = Some(match extremes[row] {
                Some((lo, hi)) => (lo.min(x), hi.max(x)),
                None => (x, x),
            });
        }

        let mut points = Vec::with_capacity(rows * 2);
        for (row, ext) in extremes.into_iter().enumerate() {
            if let Some((lo, hi)) = ext {
                let y = (row + self.bbox.min_y) as f64;
                points.push((lo as f64, y));
                if hi != lo {
                    points.push((hi as f64, y));
                }
            }
        }
        points
    }
}

/// Label 8-connected components of the set pixels
pub fn connected_components(mask: &Mask) -> Vec<Component> {
    let (w, h) = (mask.width, mask.height);
    let mut seen = vec![false; w * h];
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if !mask.data[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        stack.push(start);
        let mut pixels = Vec::new();
        let mut bbox = BoundingBox::at(start % w, start / w);

        while let Some(idx) = stack.pop() {
            let x = idx % w;
            let y = idx / w;
            bbox.include(x, y);
            pixels.push(idx);

            let y_lo = y.saturating_sub(1);
            let y_hi = (y + 1).min(h - 1);
            let x_lo = x.saturating_sub(1);
            let x_hi = (x + 1).min(w - 1);
            for ny in y_lo..=y_hi {
                for nx in x_lo..=x_hi {
                    let n = ny * w + nx;
                    if mask.data[n] && !seen[n] {
                        seen[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        components.push(Component { pixels, bbox });
    }

    components
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Convex hull (monotone chain), counter-clockwise, collinear points dropped
pub fn convex_hull(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Perimeter of a closed polygon
pub fn perimeter(polygon: &[(f64, f64)]) -> f64 {
    if polygon.len() < 2 {
        return 0.0;
    }
    polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt())
        .sum()
}

fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return ((p.0 - a.0).powi(2) + (p.1 - a.1).powi(2)).sqrt();
    }
    cross(a, b, p).abs() / len_sq.sqrt()
}

fn simplify_open(points: &[(f64, f64)], epsilon: f64, out: &mut Vec<(f64, f64)>) {
    let last = points.len() - 1;
    let (mut far, mut far_dist) = (0, 0.0);
    for (i, &p) in points.iter().enumerate().take(last).skip(1) {
        let d = distance_to_segment(p, points[0], points[last]);
        if d > far_dist {
            far = i;
            far_dist = d;
        }
    }

    if far_dist > epsilon {
        simplify_open(&points[..=far], epsilon, out);
        out.pop();
        simplify_open(&points[far..], epsilon, out);
    } else {
        out.push(points[0]);
        out.push(points[last]);
    }
}

/// Douglas-Peucker simplification of a closed polygon
pub fn approximate_closed(polygon: &[(f64, f64)], epsilon: f64) -> Vec<(f64, f64)> {
    if polygon.len() < 4 {
        return polygon.to_vec();
    }

    // Split at the vertex farthest from the first one
    let origin = polygon[0];
    let split = polygon
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let da = (a.0 - origin.0).powi(2) + (a.1 - origin.1).powi(2);
            let db = (b.0 - origin.0).powi(2) + (b.1 - origin.1).powi(2);
            da.total_cmp(&db)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    if split == 0 {
        return vec![origin];
    }

    let mut second_half: Vec<(f64, f64)> = polygon[split..].to_vec();
    second_half.push(origin);

    let mut out = Vec::new();
    simplify_open(&polygon[..=split], epsilon, &mut out);
    out.pop();
    simplify_open(&second_half, epsilon, &mut out);
    out.pop();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_mask(w: usize, h: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> Mask {
        Mask::from_fn(w, h, |x, y| {
            let inside = x >= x0 && x <= x1 && y >= y0 && y <= y1;
            let border = x == x0 || x == x1 || y == y0 || y == y1;
            inside && border
        })
    }

    #[test]
    fn test_components_are_eight_connected() {
        // Diagonal staircase is one component under 8-connectivity
        let mask = Mask::from_fn(5, 5, |x, y| x == y);
        let components = connected_components(&mask);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].pixel_count(), 5);
    }

    #[test]
    fn test_separate_components() {
        let mask = Mask::from_fn(10, 4, |x, _| x < 2 || x > 7);
        let components = connected_components(&mask);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].bbox.width(), 2);
    }

    #[test]
    fn test_filled_area_of_ring() {
        let mask = ring_mask(40, 30, 5, 5, 24, 14);
        let components = connected_components(&mask);
        assert_eq!(components.len(), 1);
        // 20 x 10 box, fully enclosed
        assert_eq!(components[0].filled_area(mask.width), 200);
    }

    #[test]
    fn test_filled_area_of_open_shape() {
        // An L shape encloses nothing beyond its own pixels
        let mask = Mask::from_fn(20, 20, |x, y| (x == 3 && y < 15) || (y == 14 && x < 15));
        let components = connected_components(&mask);
        let c = &components[0];
        assert_eq!(c.filled_area(mask.width), c.pixel_count());
    }

    #[test]
    fn test_hull_of_rectangle_has_four_vertices() {
        let mask = ring_mask(40, 30, 5, 5, 24, 14);
        let components = connected_components(&mask);
        let hull = convex_hull(&components[0].row_extremes(mask.width));
        assert_eq!(hull.len(), 4);
        assert!((perimeter(&hull) - 2.0 * (19.0 + 9.0)).abs() < 1e-9);
    }

    #[test]
    fn test_approximation_collapses_cut_corners() {
        // Octagon with small corner cuts approximates to a quadrilateral
        let polygon = vec![
            (2.0, 0.0),
            (98.0, 0.0),
            (100.0, 2.0),
            (100.0, 58.0),
            (98.0, 60.0),
            (2.0, 60.0),
            (0.0, 58.0),
            (0.0, 2.0),
        ];
        let eps = 0.02 * perimeter(&polygon);
        let approx = approximate_closed(&polygon, eps);
        assert_eq!(approx.len(), 4);
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox {
            min_x: 0,
            min_y: 0,
            max_x: 9,
            max_y: 9,
        };
        let b = BoundingBox {
            min_x: 5,
            min_y: 0,
            max_x: 14,
            max_y: 9,
        };
        assert!((a.iou(&a) - 1.0).abs() < 1e-12);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-12);
    }
}
