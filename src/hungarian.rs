use std::collections::VecDeque;

use crate::data::Pos;
use crate::mat::Mat;

/// Sentinel for "unreachable"; absorbing in all matrix transformations.
pub const INF: usize = usize::max_value();

/// Bipartite graph over rows `0..n` and columns `n..2n`.
pub type AdjacencyList = Vec<Vec<usize>>;

/// Maximum bipartite matching. Rows and columns share one index space,
/// with a NIL pseudo-vertex at `adjacent.len()`.
#[derive(Debug, Default)]
pub struct HopcroftKarp {
    nil: usize,
    distance: Vec<usize>,
    mapping: Vec<usize>,
}

impl HopcroftKarp {
    pub fn solve(&mut self, adjacent: &AdjacencyList) -> usize {
        self.nil = adjacent.len();
        self.distance = vec![INF; self.nil + 1];
        self.mapping = vec![self.nil; self.nil];

        let mut result = 0;
        while self.bfs(adjacent) {
            for row in 0..adjacent.len() / 2 {
                if self.mapping[row] == self.nil && self.dfs(adjacent, row) {
                    result += 1;
                }
            }
        }
        result
    }

    pub fn mapping(&self) -> &[usize] {
        &self.mapping
    }

    /// Row-to-column mapping with the column offset removed. Unmatched
    /// rows report the pseudo-column `n`.
    pub fn transformed_mapping(&self) -> Vec<usize> {
        let rows = self.mapping.len() / 2;
        self.mapping[..rows].iter().map(|&m| m - rows).collect()
    }

    fn bfs(&mut self, adjacent: &AdjacencyList) -> bool {
        let rows = adjacent.len() / 2;

        let mut queue = VecDeque::new();
        for row in 0..rows {
            if self.mapping[row] == self.nil {
                self.distance[row] = 0;
                queue.push_back(row);
            } else {
                self.distance[row] = INF;
            }
        }
        self.distance[self.nil] = INF;

        while let Some(u) = queue.pop_front() {
            if self.distance[u] < self.distance[self.nil] {
                for &col in &adjacent[u] {
                    let next = self.mapping[col];
                    if self.distance[next] == INF {
                        self.distance[next] = self.distance[u] + 1;
                        queue.push_back(next);
                    }
                }
            }
        }
        self.distance[self.nil] != INF
    }

    fn dfs(&mut self, adjacent: &AdjacencyList, row: usize) -> bool {
        if row == self.nil {
            return true;
        }
        for idx in 0..adjacent[row].len() {
            let col = adjacent[row][idx];
            let next = self.mapping[col];
            if self.distance[next] == self.distance[row] + 1 && self.dfs(adjacent, next) {
                self.mapping[row] = col;
                self.mapping[col] = row;
                return true;
            }
        }
        self.distance[row] = INF;
        false
    }
}

/// Minimum-cost assignment on a square cost matrix: Kuhn/Munkres row and
/// column reduction, Hopcroft-Karp on the zero subgraph, and the Koenig
/// cover for the dual update.
#[derive(Debug, Default)]
pub struct HungarianAlgo {
    mat: Mat<usize>,
    adjacent: AdjacencyList,
    matching: HopcroftKarp,
    row_zeroes: Vec<bool>,
    col_zeroes: Vec<bool>,
}

impl HungarianAlgo {
    pub fn solve(&mut self, mat: &Mat<usize>) -> Vec<usize> {
        assert_eq!(mat.rows(), mat.cols());
        self.mat = mat.clone();
        self.prepare_mat();

        loop {
            if self.matching.solve(&self.adjacent) == self.mat.rows() {
                return self.matching.transformed_mapping();
            }
            let mapping = self.matching.mapping().to_vec();
            self.mark_zeroes(&mapping);
            self.alpha_transformation();
        }
    }

    /// Row reduction, then column reduction where the column minimum is
    /// positive. Zeros of the reduced matrix become graph edges.
    fn prepare_mat(&mut self) {
        let (rows, cols) = (self.mat.rows(), self.mat.cols());
        self.adjacent = vec![Vec::new(); rows + cols];

        for i in 0..rows {
            let mut min = INF;
            for j in 0..cols {
                min = min.min(self.mat[Pos::new(i, j)]);
            }
            // a row of all INF means a box with no reachable destination,
            // which the solvability gate rejects before assignment
            debug_assert!(min != INF);
            for j in 0..cols {
                let p = Pos::new(i, j);
                if self.mat[p] != INF {
                    self.mat[p] -= min;
                }
                if self.mat[p] == 0 {
                    self.add_adjacent(i, j);
                }
            }
        }

        for j in 0..cols {
            let mut min = INF;
            for i in 0..rows {
                min = min.min(self.mat[Pos::new(i, j)]);
            }
            if min == 0 || min == INF {
                continue;
            }
            for i in 0..rows {
                let p = Pos::new(i, j);
                if self.mat[p] != INF {
                    self.mat[p] -= min;
                }
                if self.mat[p] == 0 {
                    self.add_adjacent(i, j);
                }
            }
        }
    }

    /// Koenig marking: alternate from unmatched rows through zero edges.
    /// A `false` row or a `true` column is part of the vertex cover.
    fn mark_zeroes(&mut self, mapping: &[usize]) {
        let n = mapping.len() / 2;
        self.row_zeroes = vec![true; n];
        self.col_zeroes = vec![false; n];

        for row in 0..n {
            if mapping[row] != mapping.len() {
                continue;
            }
            self.mark_zeroes_single(mapping, row);
        }
    }

    fn mark_zeroes_single(&mut self, mapping: &[usize], row: usize) {
        if !self.row_zeroes[row] {
            return;
        }
        self.row_zeroes[row] = false;

        let nil = mapping.len();
        let n = self.row_zeroes.len();
        for idx in 0..self.adjacent[row].len() {
            let col = self.adjacent[row][idx];
            if mapping[col] == row || self.col_zeroes[col - n] {
                continue;
            }
            self.col_zeroes[col - n] = true;
            if mapping[col] != nil {
                self.mark_zeroes_single(mapping, mapping[col]);
            }
        }
    }

    /// Subtract the minimum uncovered entry from uncovered cells, add it
    /// to doubly-covered ones; INF is absorbing both ways.
    fn alpha_transformation(&mut self) {
        let (rows, cols) = (self.mat.rows(), self.mat.cols());

        let mut minimum = INF;
        for i in 0..rows {
            if self.row_zeroes[i] {
                continue;
            }
            for j in 0..cols {
                if !self.col_zeroes[j] {
                    minimum = minimum.min(self.mat[Pos::new(i, j)]);
                }
            }
        }
        assert!(minimum != 0);
        debug_assert!(minimum != INF);

        for i in 0..rows {
            for j in 0..cols {
                let p = Pos::new(i, j);
                if !self.row_zeroes[i] && !self.col_zeroes[j] {
                    if self.mat[p] != INF {
                        self.mat[p] -= minimum;
                    }
                    if self.mat[p] == 0 {
                        self.add_adjacent(i, j);
                    }
                } else if self.row_zeroes[i] && self.col_zeroes[j] {
                    if self.mat[p] == 0 {
                        self.remove_adjacent(i, j);
                    }
                    if self.mat[p] != INF {
                        self.mat[p] += minimum;
                    }
                }
            }
        }
    }

    fn add_adjacent(&mut self, i: usize, j: usize) {
        let col = self.mat.rows() + j;
        debug_assert!(!self.adjacent[i].contains(&col));
        self.adjacent[i].push(col);
        self.adjacent[col].push(i);
    }

    fn remove_adjacent(&mut self, i: usize, j: usize) {
        let col = self.mat.rows() + j;
        let idx = match self.adjacent[i].iter().position(|&c| c == col) {
            Some(idx) => idx,
            None => return,
        };
        self.adjacent[i].remove(idx);
        let back = self.adjacent[col]
            .iter()
            .position(|&r| r == i)
            .expect("asymmetric adjacency");
        self.adjacent[col].remove(back);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_adjacency(incidence: &[Vec<u8>]) -> AdjacencyList {
        let rows = incidence.len();
        let mut result = vec![Vec::new(); rows + incidence[0].len()];
        for (i, row) in incidence.iter().enumerate() {
            for (j, &edge) in row.iter().enumerate() {
                if edge != 0 {
                    result[i].push(rows + j);
                    result[rows + j].push(i);
                }
            }
        }
        result
    }

    fn cost_mat(rows: &[Vec<usize>]) -> Mat<usize> {
        let cols = rows[0].len();
        Mat::from_flat(rows.iter().flatten().cloned().collect(), cols)
    }

    #[test]
    fn hopcroft_karp_perfect_matching() {
        let mut algo = HopcroftKarp::default();
        algo.solve(&to_adjacency(&[
            vec![0, 1, 1],
            vec![0, 1, 0],
            vec![1, 0, 1],
        ]));
        assert_eq!(algo.transformed_mapping(), vec![2, 1, 0]);

        algo.solve(&to_adjacency(&[
            vec![0, 0, 1, 0, 1],
            vec![0, 0, 1, 0, 1],
            vec![1, 1, 0, 1, 0],
            vec![0, 1, 1, 1, 1],
            vec![0, 0, 0, 1, 0],
        ]));
        assert_eq!(algo.transformed_mapping(), vec![2, 4, 0, 1, 3]);
    }

    #[test]
    fn hopcroft_karp_partial_matching() {
        let mut algo = HopcroftKarp::default();
        let size = algo.solve(&to_adjacency(&[
            vec![1, 0, 0],
            vec![0, 0, 1],
            vec![0, 0, 0],
        ]));
        assert_eq!(size, 2);
        // unmatched rows report the pseudo-column
        assert_eq!(algo.transformed_mapping(), vec![0, 2, 3]);

        let size = algo.solve(&to_adjacency(&[
            vec![1, 0, 0],
            vec![0, 0, 0],
            vec![0, 0, 1],
        ]));
        assert_eq!(size, 2);
        assert_eq!(algo.transformed_mapping(), vec![0, 3, 2]);
    }

    #[test]
    fn hungarian_five_by_five() {
        let mat = cost_mat(&[
            vec![32, 28, 4, 26, 4],
            vec![17, 19, 4, 17, 4],
            vec![4, 4, 5, 4, 4],
            vec![17, 14, 4, 14, 4],
            vec![21, 16, 4, 13, 4],
        ]);
        let result = HungarianAlgo::default().solve(&mat);
        assert_eq!(result, vec![2, 4, 0, 1, 3]);

        let cost: usize = result
            .iter()
            .enumerate()
            .map(|(i, &j)| mat[Pos::new(i, j)])
            .sum();
        assert_eq!(cost, 39);
    }

    #[test]
    fn hungarian_small_cases() {
        let result = HungarianAlgo::default().solve(&cost_mat(&[
            vec![4, 6, 8],
            vec![7, 5, 6],
            vec![1, 8, 6],
        ]));
        assert_eq!(result, vec![1, 2, 0]);

        let result =
            HungarianAlgo::default().solve(&cost_mat(&[vec![0, 5], vec![4, 10]]));
        assert_eq!(result, vec![1, 0]);
    }

    #[test]
    fn hungarian_is_optimal_on_permutations() {
        // brute-force check on a 4x4 instance
        let costs = vec![
            vec![9, 11, 14, 11],
            vec![6, 15, 13, 13],
            vec![12, 13, 6, 8],
            vec![11, 9, 10, 12],
        ];
        let mat = cost_mat(&costs);
        let result = HungarianAlgo::default().solve(&mat);

        // result is a permutation
        let mut seen = vec![false; 4];
        for &j in &result {
            assert!(!seen[j]);
            seen[j] = true;
        }
        let total: usize = result.iter().enumerate().map(|(i, &j)| costs[i][j]).sum();

        let mut best = INF;
        let mut perm = [0, 1, 2, 3];
        for_each_permutation(4, &mut perm, &mut |p| {
            let cost: usize = p.iter().enumerate().map(|(i, &j)| costs[i][j]).sum();
            best = best.min(cost);
        });
        assert_eq!(total, best);
    }

    // Heap's algorithm, enough for the brute-force comparison
    fn for_each_permutation(k: usize, perm: &mut [usize; 4], visit: &mut impl FnMut(&[usize; 4])) {
        if k == 1 {
            visit(perm);
            return;
        }
        for i in 0..k {
            for_each_permutation(k - 1, perm, visit);
            if k % 2 == 0 {
                perm.swap(i, k - 1);
            } else {
                perm.swap(0, k - 1);
            }
        }
    }

    #[test]
    fn hungarian_with_unreachable_entries() {
        // INF must stay absorbing through the reductions; the cheapest
        // finite assignment is 5 + 2 + 6
        let result = HungarianAlgo::default().solve(&cost_mat(&[
            vec![INF, 3, 5],
            vec![2, INF, 7],
            vec![4, 6, INF],
        ]));
        assert_eq!(result, vec![2, 0, 1]);
    }
}
