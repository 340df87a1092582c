//! Hierarchical Risk Parity (spec §4.4): correlation-distance clustering,
//! quasi-diagonalization, then recursive bisection allocation.
//!
//! Falls back to equal weight below three assets or when clustering
//! degenerates (e.g. all correlations identical, producing a singular
//! distance matrix).

fn correlation_matrix(cov: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = cov.len();
    let stdevs: Vec<f64> = (0..n).map(|i| cov[i][i].max(0.0).sqrt()).collect();
    let mut corr = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            if stdevs[i] <= 1e-12 || stdevs[j] <= 1e-12 {
                corr[i][j] = if i == j { 1.0 } else { 0.0 };
            } else {
                corr[i][j] = (cov[i][j] / (stdevs[i] * stdevs[j])).clamp(-1.0, 1.0);
            }
        }
    }
    corr
}

/// `sqrt(0.5 * (1 - corr))`, the standard correlation-distance metric.
fn distance_matrix(corr: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = corr.len();
    let mut dist = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            dist[i][j] = (0.5 * (1.0 - corr[i][j])).max(0.0).sqrt();
        }
    }
    dist
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(usize),
    Merge(Box<Node>, Box<Node>),
}

impl Node {
    fn leaves(&self, out: &mut Vec<usize>) {
        match self {
            Node::Leaf(i) => out.push(*i),
            Node::Merge(a, b) => {
                a.leaves(out);
                b.leaves(out);
            }
        }
    }
}

/// Single-linkage agglomerative clustering producing one binary tree.
fn single_linkage_cluster(dist: &[Vec<f64>], n: usize) -> Node {
    let mut clusters: Vec<Node> = (0..n).map(Node::Leaf).collect();
    let mut cluster_members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    while clusters.len() > 1 {
        let k = clusters.len();
        let mut best = (0usize, 1usize, f64::INFINITY);
        for a in 0..k {
            for b in (a + 1)..k {
                // single linkage: min distance between any pair across clusters
                let mut min_d = f64::INFINITY;
                for &i in &cluster_members[a] {
                    for &j in &cluster_members[b] {
                        if dist[i][j] < min_d {
                            min_d = dist[i][j];
                        }
                    }
                }
                if min_d < best.2 {
                    best = (a, b, min_d);
                }
            }
        }
        let (a, b, _) = best;
        let (hi, lo) = (a.max(b), a.min(b));
        let node_b = clusters.remove(hi);
        let node_a = clusters.remove(lo);
        let members_b = cluster_members.remove(hi);
        let mut members_a = cluster_members.remove(lo);
        members_a.extend(members_b);
        clusters.push(Node::Merge(Box::new(node_a), Box::new(node_b)));
        cluster_members.push(members_a);
    }

    clusters.into_iter().next().expect("at least one cluster")
}

/// Quasi-diagonalize: read leaf order off the dendrogram so similar assets
/// sit adjacent.
fn quasi_diagonal_order(root: &Node) -> Vec<usize> {
    let mut order = Vec::new();
    root.leaves(&mut order);
    order
}

fn cluster_variance(cov: &[Vec<f64>], members: &[usize]) -> f64 {
    // Inverse-variance weights within the cluster, then the resulting
    // portfolio variance of that sub-allocation.
    let inv_var: Vec<f64> = members.iter().map(|&i| 1.0 / cov[i][i].max(1e-18)).collect();
    let sum: f64 = inv_var.iter().sum();
    let weights: Vec<f64> = inv_var.iter().map(|v| v / sum).collect();
    let mut var = 0.0;
    for (a, &i) in members.iter().enumerate() {
        for (b, &j) in members.iter().enumerate() {
            var += weights[a] * weights[b] * cov[i][j];
        }
    }
    var.max(0.0)
}

/// Recursive bisection over the quasi-diagonalized order: split in half,
/// allocate inversely proportional to each half's cluster variance.
fn recursive_bisection(cov: &[Vec<f64>], order: &[usize]) -> Vec<f64> {
    let n = order.len();
    let mut weights = vec![1.0; n];
    let mut stack: Vec<(usize, usize, f64)> = vec![(0, n, 1.0)];

    while let Some((start, end, alloc)) = stack.pop() {
        let len = end - start;
        if len <= 1 {
            weights[order[start]] = alloc;
            continue;
        }
        let mid = start + len / 2;
        let left_members = &order[start..mid];
        let right_members = &order[mid..end];
        let var_left = cluster_variance(cov, left_members);
        let var_right = cluster_variance(cov, right_members);
        let total_inv = 1.0 / var_left.max(1e-18) + 1.0 / var_right.max(1e-18);
        let alpha_left = (1.0 / var_left.max(1e-18)) / total_inv;
        stack.push((start, mid, alloc * alpha_left));
        stack.push((mid, end, alloc * (1.0 - alpha_left)));
    }

    weights
}

/// Returns `(weights, fell_back_to_equal_weight)`. Weights are in the
/// original symbol order regardless of internal clustering order.
pub fn hierarchical_risk_parity(symbols: &[String], cov: &[Vec<f64>], n: usize) -> (Vec<f64>, bool) {
    if n < 3 {
        return (vec![1.0 / n.max(1) as f64; n], true);
    }

    let corr = correlation_matrix(cov);
    let dist = distance_matrix(&corr);
    let root = single_linkage_cluster(&dist, n);
    let order = quasi_diagonal_order(&root);

    if order.len() != n {
        return (vec![1.0 / n as f64; n], true);
    }

    let ordered_weights = recursive_bisection(cov, &order);
    if ordered_weights.iter().any(|w| !w.is_finite()) {
        return (vec![1.0 / n as f64; n], true);
    }

    let mut weights = vec![0.0; n];
    for (pos, &orig_idx) in order.iter().enumerate() {
        weights[orig_idx] = ordered_weights[pos];
    }
    let _ = symbols;
    (weights, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_asset_cov() -> Vec<Vec<f64>> {
        vec![
            vec![0.04, 0.01, 0.00],
            vec![0.01, 0.09, 0.02],
            vec![0.00, 0.02, 0.01],
        ]
    }

    #[test]
    fn below_three_assets_falls_back_to_equal_weight() {
        let symbols = vec!["A".to_string(), "B".to_string()];
        let cov = vec![vec![0.04, 0.0], vec![0.0, 0.09]];
        let (weights, fell_back) = hierarchical_risk_parity(&symbols, &cov, 2);
        assert!(fell_back);
        assert!((weights[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn three_assets_allocate_sums_to_one() {
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let cov = three_asset_cov();
        let (weights, fell_back) = hierarchical_risk_parity(&symbols, &cov, 3);
        assert!(!fell_back);
        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(weights.iter().all(|w| *w > 0.0));
    }

    #[test]
    fn lower_variance_asset_gets_more_weight_than_highest_variance() {
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let cov = three_asset_cov();
        let (weights, _) = hierarchical_risk_parity(&symbols, &cov, 3);
        // asset C has the lowest variance (0.01) and asset B the highest (0.09)
        assert!(weights[2] > weights[1]);
    }

    #[test]
    fn quasi_diagonal_order_contains_every_leaf_exactly_once() {
        let cov = three_asset_cov();
        let corr = correlation_matrix(&cov);
        let dist = distance_matrix(&corr);
        let root = single_linkage_cluster(&dist, 3);
        let mut order = quasi_diagonal_order(&root);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
