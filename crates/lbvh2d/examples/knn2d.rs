extern crate nalgebra as na;

use lbvh2d::partitioning::{Lbvh, LbvhConfig};
use na::Point2;

fn main() {
    /*
     * A 100 x 100 grid of points.
     */
    let points: Vec<_> = (0..10_000)
        .map(|i| Point2::new((i % 100) as f32, (i / 100) as f32))
        .collect();

    let mut lbvh = Lbvh::new(LbvhConfig::default().with_leaf_size(8));
    lbvh.build(&points).unwrap();
    println!(
        "{} points, {} nodes, root AABB: {:?}",
        lbvh.point_count(),
        lbvh.node_count(),
        lbvh.root_aabb()
    );

    let queries = [Point2::new(10.2, 20.7), Point2::new(-3.0, 50.0)];
    let result = lbvh.search_knn(&queries, 4).unwrap();

    for (q, query) in queries.iter().enumerate() {
        println!("Nearest neighbors of {}:", query);
        for (id, dist2) in result.neighbors(q) {
            println!("    {} ({}) at squared distance {}", id, points[id as usize], dist2);
        }
    }

    let result = lbvh.search_radius(&queries[..1], 1.5, 16).unwrap();
    println!(
        "{} points within a radius of 1.5 of {}.",
        result.neighbor_count(0),
        queries[0]
    );
}
