//! Two-dimensional k-d tree for nearest-neighbour queries over a fixed
//! point set.

/// Static k-d tree over `[x, y]` points.
///
/// Ties in distance are broken by point index, so queries are deterministic.
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<[f64; 2]>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    point: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

#[inline]
fn distance_sq(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

impl KdTree {
    pub fn build(points: Vec<[f64; 2]>) -> Self {
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        let root = Self::build_recursive(&points, &mut indices, 0, &mut nodes);
        Self {
            points,
            nodes,
            root,
        }
    }

    fn build_recursive(
        points: &[[f64; 2]],
        indices: &mut [usize],
        depth: usize,
        nodes: &mut Vec<Node>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let axis = depth % 2;
        let mid = indices.len() / 2;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            points[a][axis]
                .total_cmp(&points[b][axis])
                .then(a.cmp(&b))
        });

        let node = nodes.len();
        nodes.push(Node {
            point: indices[mid],
            axis,
            left: None,
            right: None,
        });

        let (left, rest) = indices.split_at_mut(mid);
        let left = Self::build_recursive(points, left, depth + 1, nodes);
        let right = Self::build_recursive(points, &mut rest[1..], depth + 1, nodes);
        nodes[node].left = left;
        nodes[node].right = right;
        Some(node)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<[f64; 2]> {
        self.points.get(index).copied()
    }

    /// Nearest point as `(index, distance)`
    pub fn nearest(&self, query: [f64; 2]) -> Option<(usize, f64)> {
        self.nearest_k(query, 1).into_iter().next()
    }

    /// The `k` nearest points as `(index, distance)`, closest first
    pub fn nearest_k(&self, query: [f64; 2], k: usize) -> Vec<(usize, f64)> {
        let mut best: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        if k > 0 {
            if let Some(root) = self.root {
                self.search(root, query, k, &mut best);
            }
        }
        best.into_iter().map(|(d, i)| (i, d.sqrt())).collect()
    }

    fn search(&self, node: usize, query: [f64; 2], k: usize, best: &mut Vec<(f64, usize)>) {
        let Node {
            point,
            axis,
            left,
            right,
        } = self.nodes[node];
        let p = self.points[point];
        let candidate = (distance_sq(p, query), point);

        let full = best.len() == k;
        let better = best
            .last()
            .map_or(true, |worst| less(candidate, *worst));
        if !full || better {
            let pos = best.partition_point(|&entry| less(entry, candidate));
            best.insert(pos, candidate);
            best.truncate(k);
        }

        let diff = query[axis] - p[axis];
        let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };

        if let Some(near) = near {
            self.search(near, query, k, best);
        }
        if let Some(far) = far {
            let worst = best.last().map_or(f64::INFINITY, |w| w.0);
            if best.len() < k || diff * diff <= worst {
                self.search(far, query, k, best);
            }
        }
    }
}

#[inline]
fn less(a: (f64, usize), b: (f64, usize)) -> bool {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).is_lt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(points: &[[f64; 2]], query: [f64; 2], k: usize) -> Vec<usize> {
        let mut all: Vec<(f64, usize)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| (distance_sq(*p, query), i))
            .collect();
        all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        all.into_iter().take(k).map(|(_, i)| i).collect()
    }

    fn grid_points() -> Vec<[f64; 2]> {
        let mut points = Vec::new();
        for x in 0..10 {
            for y in 0..7 {
                points.push([x as f64 * 0.5 + (y as f64) * 0.01, y as f64 * 0.3]);
            }
        }
        points
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let points = grid_points();
        let tree = KdTree::build(points.clone());

        for query in [[0.0, 0.0], [2.26, 1.1], [-3.0, 10.0], [4.9, 0.61]] {
            let expected = brute_force(&points, query, 1)[0];
            let (found, _) = tree.nearest(query).unwrap();
            assert_eq!(found, expected, "query {:?}", query);
        }
    }

    #[test]
    fn test_nearest_k_matches_brute_force() {
        let points = grid_points();
        let tree = KdTree::build(points.clone());

        for query in [[1.0, 1.0], [3.33, 0.2], [10.0, 10.0]] {
            let found: Vec<usize> = tree.nearest_k(query, 5).into_iter().map(|(i, _)| i).collect();
            assert_eq!(found, brute_force(&points, query, 5));
        }
    }

    #[test]
    fn test_distances_are_euclidean() {
        let tree = KdTree::build(vec![[0.0, 0.0], [3.0, 4.0]]);
        let result = tree.nearest_k([0.0, 0.0], 2);
        assert_eq!(result[0], (0, 0.0));
        assert!((result[1].1 - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_k_larger_than_point_count() {
        let tree = KdTree::build(vec![[0.0, 0.0], [1.0, 0.0]]);
        assert_eq!(tree.nearest_k([0.2, 0.0], 10).len(), 2);
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(Vec::new());
        assert!(tree.is_empty());
        assert!(tree.nearest([0.0, 0.0]).is_none());
    }

    #[test]
    fn test_duplicate_points_tie_break_by_index() {
        let tree = KdTree::build(vec![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]);
        let found: Vec<usize> = tree.nearest_k([1.0, 1.0], 3).into_iter().map(|(i, _)| i).collect();
        assert_eq!(found, vec![0, 1, 2]);
    }
}
