//! Nearest-palette-color search via a k-d tree over palette RGB values
//! (spec §4.2), rebuilt once per palette. Ties are broken by lowest index.

use rgb::RGB8;

struct Node {
    /// Index into the original palette slice this node represents.
    palette_index: usize,
    axis: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

pub struct KdTree {
    root: Option<Box<Node>>,
    colors: Vec<RGB8>,
}

fn channel(c: RGB8, axis: usize) -> i32 {
    match axis {
        0 => c.r as i32,
        1 => c.g as i32,
        _ => c.b as i32,
    }
}

fn build(entries: &mut [(usize, RGB8)], depth: usize) -> Option<Box<Node>> {
    if entries.is_empty() {
        return None;
    }
    let axis = depth % 3;
    entries.sort_by_key(|(_, c)| channel(*c, axis));
    let mid = entries.len() / 2;
    let (palette_index, _) = entries[mid];

    let (left_entries, rest) = entries.split_at_mut(mid);
    let right_entries = &mut rest[1..];

    Some(Box::new(Node {
        palette_index,
        axis,
        left: build(left_entries, depth + 1),
        right: build(right_entries, depth + 1),
    }))
}

impl KdTree {
    /// Builds a tree over `colors`. Lowest original index wins among
    /// exact duplicates during both build and search.
    pub fn build(colors: &[RGB8]) -> Self {
        let mut entries: Vec<(usize, RGB8)> = colors.iter().copied().enumerate().collect();
        let root = build(&mut entries, 0);
        KdTree { root, colors: colors.to_vec() }
    }

    /// Returns the palette index of the nearest color to `query`, breaking
    /// ties by the lowest index.
    pub fn nearest(&self, query: RGB8) -> usize {
        let mut best_index = 0usize;
        let mut best_dist = i64::MAX;
        if let Some(root) = &self.root {
            self.search(root, query, &mut best_index, &mut best_dist);
        }
        best_index
    }

    fn search(&self, node: &Node, query: RGB8, best_index: &mut usize, best_dist: &mut i64) {
        let candidate = self.colors[node.palette_index];
        let dist = squared_distance(candidate, query);
        if dist < *best_dist || (dist == *best_dist && node.palette_index < *best_index) {
            *best_dist = dist;
            *best_index = node.palette_index;
        }

        let diff = channel(query, node.axis) - channel(candidate, node.axis);
        let (near, far) = if diff <= 0 { (&node.left, &node.right) } else { (&node.right, &node.left) };

        if let Some(near) = near {
            self.search(near, query, best_index, best_dist);
        }
        // Only descend into the far side if it could contain something
        // closer than the current best.
        if (diff as i64) * (diff as i64) < *best_dist {
            if let Some(far) = far {
                self.search(far, query, best_index, best_dist);
            }
        }
    }
}

fn squared_distance(a: RGB8, b: RGB8) -> i64 {
    let dr = a.r as i64 - b.r as i64;
    let dg = a.g as i64 - b.g as i64;
    let db = a.b as i64 - b.b as i64;
    dr * dr + dg * dg + db * db
}
