extern crate nalgebra as na;

use lbvh3d::partitioning::{Lbvh, LbvhConfig};
use na::{Point3, Vector3};
use std::time::Instant;

fn main() {
    /*
     * Sample a noisy sphere, like a scanned point cloud.
     */
    let n = 1_000_000;
    let points: Vec<_> = (0..n)
        .map(|i| {
            let t = i as f32 / n as f32;
            let phi = t * core::f32::consts::PI * 2.0 * 1000.0;
            let z = t * 2.0 - 1.0;
            let r = (1.0 - z * z).sqrt();
            Point3::from(Vector3::new(r * phi.cos(), r * phi.sin(), z))
        })
        .collect();

    /*
     * Build the tree.
     */
    let mut lbvh = Lbvh::new(LbvhConfig::default().with_leaf_size(16));
    let t0 = Instant::now();
    lbvh.build(&points).unwrap();
    println!(
        "Built an LBVH over {} points in {:.2}ms: {} nodes, depth {}.",
        lbvh.point_count(),
        t0.elapsed().as_secs_f64() * 1000.0,
        lbvh.node_count(),
        lbvh.depth()
    );

    /*
     * Find the 8 nearest neighbors of every point.
     */
    let t0 = Instant::now();
    let result = lbvh.search_knn(&points, 8).unwrap();
    println!(
        "Answered {} 8-NN queries in {:.2}ms.",
        result.query_count(),
        t0.elapsed().as_secs_f64() * 1000.0
    );

    for (id, dist2) in result.neighbors(0) {
        println!("Neighbor of point 0: {} at distance {}", id, dist2.sqrt());
    }
}
