//! Builds a [`BspTree`] from a triangle soup.
//!
//! Split planes are axis aligned and pass through a vertex of the current face subset.
//! Each candidate is scored on front/back balance, straddling faces and coplanar faces,
//! lower is better. Subsets with no acceptable plane become leaves.

use ahash::AHashSet;
use glam::Vec3;

use crate::error::{Error, Result};
use crate::geo::Bounds;

use super::consts::MAX_LEAF_FACES;
use super::{Axis, BspChild, BspNode, BspTree, SplitPlane, BACK, FRONT};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaceSide {
    Front,
    Back,
    /// All three vertices on the plane.
    Coplanar,
    /// Vertices on both sides.
    Straddle,
}

impl FaceSide {
    /// Straddling and coplanar faces belong to both children.
    pub fn goes_front(self) -> bool {
        self != FaceSide::Back
    }

    pub fn goes_back(self) -> bool {
        self != FaceSide::Front
    }
}

pub fn classify_face(plane: SplitPlane, points: [Vec3; 3]) -> FaceSide {
    let (mut below, mut above) = (false, false);
    for p in points {
        let d = plane.distance(p);
        if d < 0.0 {
            below = true;
        } else if d > 0.0 {
            above = true;
        }
    }
    match (below, above) {
        (true, true) => FaceSide::Straddle,
        (true, false) => FaceSide::Front,
        (false, true) => FaceSide::Back,
        (false, false) => FaceSide::Coplanar,
    }
}

/// Splits `subset` (indices into `triangles`) into its front and back parts.
pub fn partition(plane: SplitPlane, triangles: &[[Vec3; 3]], subset: &[u32]) -> (Vec<u32>, Vec<u32>) {
    let mut front = Vec::new();
    let mut back = Vec::new();
    for &face in subset {
        let side = classify_face(plane, triangles[face as usize]);
        if side.goes_front() {
            front.push(face);
        }
        if side.goes_back() {
            back.push(face);
        }
    }
    (front, back)
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BspBuilderConfig {
    pub coplanar_weight: f32,
    pub intersect_weight: f32,
    pub split_weight: f32,
    /// Planes scoring above this are not used.
    pub min_split_metric: f32,
    /// Subsets this small are not split further.
    pub min_leaf_faces: usize,
    pub max_depth: usize,
}

impl Default for BspBuilderConfig {
    fn default() -> Self {
        Self {
            coplanar_weight: 0.5,
            intersect_weight: 1.0,
            split_weight: 1.0,
            min_split_metric: 0.5,
            min_leaf_faces: 1,
            max_depth: 64,
        }
    }
}

struct Task {
    faces: Vec<u32>,
    depth: usize,
    /// Parent node and side to attach the result to, `None` for the root.
    slot: Option<(usize, usize)>,
}

#[derive(Default)]
struct Counts {
    front: usize,
    back: usize,
    coplanar: usize,
    straddle: usize,
}

pub struct BspBuilder {
    config: BspBuilderConfig,
}

impl BspBuilder {
    pub fn new(config: BspBuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BspBuilderConfig {
        &self.config
    }

    pub fn build(&self, vertices: &[Vec3], faces: &[[u16; 3]]) -> Result<BspTree> {
        let triangles = faces
            .iter()
            .map(|face| {
                let point = |i: u16| {
                    vertices
                        .get(i as usize)
                        .copied()
                        .ok_or(Error::FaceIndexOutOfRange {
                            index: i as usize,
                            count: vertices.len(),
                        })
                };
                Ok([point(face[0])?, point(face[1])?, point(face[2])?])
            })
            .collect::<Result<Vec<_>>>()?;
        let face_count = u32::try_from(triangles.len())
            .map_err(|_| Error::CountOverflow(triangles.len()))?;

        // every lod vertex, referenced or not
        let bounds = Bounds::from_points(vertices.iter().copied());
        let mut nodes: Vec<BspNode> = Vec::new();
        let mut stack = vec![Task {
            faces: (0..face_count).collect(),
            depth: 0,
            slot: None,
        }];

        while let Some(task) = stack.pop() {
            let Some(plane) = self.best_split(&triangles, &task.faces, task.depth) else {
                if task.faces.len() > MAX_LEAF_FACES {
                    log::warn!("no split for {} faces, leaf will not fit", task.faces.len());
                }
                match task.slot {
                    Some((parent, side)) => {
                        nodes[parent].children[side] = BspChild::Leaf(task.faces)
                    }
                    None => nodes.push(Self::dummy_root(&bounds, task.faces)),
                }
                continue;
            };

            let index = nodes.len();
            if let Some((parent, side)) = task.slot {
                nodes[parent].children[side] = BspChild::Node(index);
            }
            let (front, back) = partition(plane, &triangles, &task.faces);
            nodes.push(BspNode {
                plane,
                children: [BspChild::Leaf(Vec::new()), BspChild::Leaf(Vec::new())],
            });

            // front is popped first, keeping the arena in pre-order
            stack.push(Task {
                faces: back,
                depth: task.depth + 1,
                slot: Some((index, BACK)),
            });
            stack.push(Task {
                faces: front,
                depth: task.depth + 1,
                slot: Some((index, FRONT)),
            });
        }

        let tree = BspTree { bounds, nodes };
        log::debug!(
            "built BSP over {face_count} faces: {} nodes, {} face refs, depth {}",
            tree.nodes.len(),
            tree.face_ref_count(),
            tree.depth()
        );
        Ok(tree)
    }

    /// Single node holding every face on its front side.
    fn dummy_root(bounds: &Bounds, faces: Vec<u32>) -> BspNode {
        BspNode {
            plane: SplitPlane::new(Axis::X, bounds.max.x),
            children: [BspChild::Leaf(faces), BspChild::Leaf(Vec::new())],
        }
    }

    fn best_split(&self, triangles: &[[Vec3; 3]], subset: &[u32], depth: usize) -> Option<SplitPlane> {
        // oversized subsets must be split whatever the score
        let forced = subset.len() > MAX_LEAF_FACES;
        if !forced && (subset.len() <= self.config.min_leaf_faces || depth >= self.config.max_depth) {
            return None;
        }

        let mut best: Option<(f32, SplitPlane)> = None;
        for plane in candidate_planes(triangles, subset) {
            let counts = count_sides(plane, triangles, subset);
            if counts.front == 0 || counts.back == 0 {
                continue;
            }
            let metric = self.metric(&counts, subset.len());
            if !forced && metric > self.config.min_split_metric {
                continue;
            }
            if best.map_or(true, |(m, _)| metric < m) {
                best = Some((metric, plane));
            }
        }
        best.map(|(_, plane)| plane)
    }

    fn metric(&self, counts: &Counts, total: usize) -> f32 {
        let total = total as f32;
        let split_ratio = counts.front as f32 / (counts.front + counts.back) as f32;
        (0.5 - split_ratio).abs() * self.config.split_weight
            + counts.straddle as f32 / total * self.config.intersect_weight
            + counts.coplanar as f32 / total * self.config.coplanar_weight
    }
}

fn count_sides(plane: SplitPlane, triangles: &[[Vec3; 3]], subset: &[u32]) -> Counts {
    let mut counts = Counts::default();
    for &face in subset {
        match classify_face(plane, triangles[face as usize]) {
            FaceSide::Front => counts.front += 1,
            FaceSide::Back => counts.back += 1,
            FaceSide::Coplanar => counts.coplanar += 1,
            FaceSide::Straddle => counts.straddle += 1,
        }
    }
    counts
}

/// Every distinct vertex coordinate of the subset, per axis, in ascending order.
fn candidate_planes(triangles: &[[Vec3; 3]], subset: &[u32]) -> Vec<SplitPlane> {
    let mut seen = AHashSet::new();
    for &face in subset {
        for p in triangles[face as usize] {
            for axis in Axis::ALL {
                // folds -0.0 into 0.0
                let value = p[axis.index()] + 0.0;
                seen.insert((axis, value.to_bits()));
            }
        }
    }
    let mut planes: Vec<SplitPlane> = seen
        .into_iter()
        .map(|(axis, bits)| SplitPlane::new(axis, f32::from_bits(bits)))
        .collect();
    planes.sort_by(|a, b| a.axis.cmp(&b.axis).then(a.value.total_cmp(&b.value)));
    planes
}

#[cfg(test)]
mod tests {
    use glam::vec3;
    use proptest::prelude::*;

    use super::*;

    /// Two triangles per side of an axis aligned box.
    fn cube(min: Vec3, max: Vec3) -> (Vec<Vec3>, Vec<[u16; 3]>) {
        let vertices = (0..8)
            .map(|i| {
                vec3(
                    if i & 1 == 0 { min.x } else { max.x },
                    if i & 2 == 0 { min.y } else { max.y },
                    if i & 4 == 0 { min.z } else { max.z },
                )
            })
            .collect();
        let faces = vec![
            [0, 2, 6], [0, 6, 4], // -x
            [1, 5, 7], [1, 7, 3], // +x
            [0, 4, 5], [0, 5, 1], // -y
            [2, 3, 7], [2, 7, 6], // +y
            [0, 1, 3], [0, 3, 2], // -z
            [4, 6, 7], [4, 7, 5], // +z
        ];
        (vertices, faces)
    }

    fn triangles(vertices: &[Vec3], faces: &[[u16; 3]]) -> Vec<[Vec3; 3]> {
        faces
            .iter()
            .map(|f| f.map(|i| vertices[i as usize]))
            .collect()
    }

    /// Every face reaches a leaf, and only through sides it is not strictly behind.
    fn assert_complete(tree: &BspTree, tris: &[[Vec3; 3]]) {
        let mut all = tree.faces_under(&BspChild::Node(0));
        all.sort_unstable();
        all.dedup();
        assert_eq!(all, (0..tris.len() as u32).collect::<Vec<_>>());

        for node in &tree.nodes {
            for face in tree.faces_under(node.front()) {
                assert!(classify_face(node.plane, tris[face as usize]).goes_front());
            }
            for face in tree.faces_under(node.back()) {
                assert!(classify_face(node.plane, tris[face as usize]).goes_back());
            }
        }
    }

    #[test]
    fn classification() {
        let plane = SplitPlane::new(Axis::X, 0.0);
        let tri = |xs: [f32; 3]| xs.map(|x| vec3(x, 1.0, 2.0));
        assert_eq!(classify_face(plane, tri([-1.0, -2.0, 0.0])), FaceSide::Front);
        assert_eq!(classify_face(plane, tri([1.0, 0.0, 0.0])), FaceSide::Back);
        assert_eq!(classify_face(plane, tri([0.0, 0.0, 0.0])), FaceSide::Coplanar);
        assert_eq!(classify_face(plane, tri([-1.0, 0.0, 1.0])), FaceSide::Straddle);
    }

    #[test]
    fn straddling_cube_faces_go_both_ways() {
        let (vertices, faces) = cube(Vec3::splat(-1.0), Vec3::splat(1.0));
        let tris = triangles(&vertices, &faces);
        let all: Vec<u32> = (0..12).collect();
        let (front, back) = partition(SplitPlane::new(Axis::X, 0.0), &tris, &all);

        // the -x and +x sides are on one side each, the 8 others cross the centre
        let both: Vec<u32> = front.iter().copied().filter(|f| back.contains(f)).collect();
        assert_eq!(both, vec![4, 5, 6, 7, 8, 9, 10, 11]);
        assert_eq!(front.len(), 10);
        assert_eq!(back.len(), 10);
        assert!(front.contains(&0) && front.contains(&1));
        assert!(back.contains(&2) && back.contains(&3));
        assert!(!front.contains(&2) && !back.contains(&0));
    }

    #[test]
    fn two_boxes_split_between_them() {
        let (mut vertices, mut faces) = cube(vec3(-3.0, -1.0, -1.0), vec3(-1.0, 1.0, 1.0));
        let (right_vertices, right_faces) = cube(vec3(1.0, -1.0, -1.0), vec3(3.0, 1.0, 1.0));
        faces.extend(right_faces.iter().map(|f| f.map(|i| i + 8)));
        vertices.extend(right_vertices);

        let tree = BspBuilder::new(Default::default()).build(&vertices, &faces).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(root.plane.axis, Axis::X);
        assert_eq!(root.plane.value.abs(), 1.0);
        assert_eq!(tree.bounds, Bounds::new(vec3(-3.0, -1.0, -1.0), vec3(3.0, 1.0, 1.0)));
        assert_complete(&tree, &triangles(&vertices, &faces));
    }

    #[test]
    fn bounds_cover_unreferenced_vertices() {
        let (mut vertices, faces) = cube(Vec3::splat(-1.0), vec3(2.0, 1.0, 1.0));
        vertices.push(vec3(50.0, 50.0, 50.0));
        let tree = BspBuilder::new(Default::default()).build(&vertices, &faces).unwrap();
        assert_eq!(tree.bounds, Bounds::new(Vec3::splat(-1.0), Vec3::splat(50.0)));
        assert_eq!(tree.nodes[0].plane, SplitPlane::new(Axis::X, 50.0));
    }

    #[test]
    fn unsplittable_soup_gets_a_dummy_root() {
        let (vertices, faces) = cube(Vec3::splat(-1.0), vec3(2.0, 1.0, 1.0));
        let tree = BspBuilder::new(Default::default()).build(&vertices, &faces).unwrap();
        assert_eq!(tree.nodes.len(), 1);
        let root = &tree.nodes[0];
        assert_eq!(root.plane, SplitPlane::new(Axis::X, 2.0));
        assert_eq!(root.front(), &BspChild::Leaf((0..12).collect()));
        assert_eq!(root.back(), &BspChild::Leaf(Vec::new()));
    }

    fn strip(count: u16) -> (Vec<Vec3>, Vec<[u16; 3]>) {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for i in 0..count {
            let x = i as f32;
            vertices.extend([vec3(x, 0.0, 0.0), vec3(x + 0.5, 1.0, 0.0), vec3(x + 0.5, 0.0, 1.0)]);
            faces.push([3 * i, 3 * i + 1, 3 * i + 2]);
        }
        (vertices, faces)
    }

    #[test]
    fn oversized_leaves_are_split_regardless_of_metric() {
        let config = BspBuilderConfig {
            min_split_metric: -1.0,
            ..Default::default()
        };
        let (vertices, faces) = strip(300);
        let tree = BspBuilder::new(config).build(&vertices, &faces).unwrap();
        assert_eq!(tree.nodes.len(), 1);
        let sizes: Vec<usize> = tree.leaves().map(<[u32]>::len).collect();
        assert_eq!(sizes, vec![150, 150]);

        // small enough for one leaf, nothing passes the threshold
        let (vertices, faces) = strip(200);
        let tree = BspBuilder::new(config).build(&vertices, &faces).unwrap();
        assert_eq!(tree.nodes[0].plane, SplitPlane::new(Axis::X, 199.5));
        assert_eq!(tree.face_ref_count(), 200);
    }

    #[test]
    fn depth_limit_stops_splitting() {
        let config = BspBuilderConfig {
            max_depth: 1,
            ..Default::default()
        };
        let (vertices, faces) = strip(16);
        let tree = BspBuilder::new(config).build(&vertices, &faces).unwrap();
        assert_eq!(tree.depth(), 1);
        assert_complete(&tree, &triangles(&vertices, &faces));
    }

    #[test]
    fn bad_face_indices_are_rejected() {
        let vertices = [Vec3::ZERO; 3];
        assert!(matches!(
            BspBuilder::new(Default::default()).build(&vertices, &[[0, 1, 3]]),
            Err(Error::FaceIndexOutOfRange { index: 3, count: 3 })
        ));
    }

    proptest! {
        #[test]
        fn every_face_lands_in_a_leaf(
            points in prop::collection::vec((-4i8..4, -4i8..4, -4i8..4), 3..24),
            picks in prop::collection::vec((0usize..64, 0usize..64, 0usize..64), 1..40),
        ) {
            let vertices: Vec<Vec3> = points
                .iter()
                .map(|&(x, y, z)| vec3(x as f32, y as f32, z as f32))
                .collect();
            let n = vertices.len();
            let faces: Vec<[u16; 3]> = picks
                .iter()
                .map(|&(a, b, c)| [(a % n) as u16, (b % n) as u16, (c % n) as u16])
                .collect();

            let tree = BspBuilder::new(Default::default()).build(&vertices, &faces).unwrap();
            prop_assert!(!tree.nodes.is_empty());
            assert_complete(&tree, &triangles(&vertices, &faces));

            let again = BspBuilder::new(Default::default()).build(&vertices, &faces).unwrap();
            prop_assert_eq!(again, tree);
        }
    }
}
