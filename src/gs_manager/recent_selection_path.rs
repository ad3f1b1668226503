// Copyright 2024 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A trie of the manager's last N selection paths, grounded in
//! `manager.cpp`'s `Manager::RecentSelectionPath`. Each edge is an action
//! id; a node's count is how many of the last N selections passed through
//! it. `summarize` walks the trie and returns the SGF move sequence of
//! every branch whose count clears the critical threshold and whose leaf
//! is still unsolved, so the manager can ask workers to explore it too.

use std::collections::HashMap;

use gs_env::{Action, Player};
use gs_mcts::tree::Tree;

#[derive(Default)]
struct TrieNode {
    count: u32,
    node_index: i32,
    children: HashMap<usize, usize>,
}

/// Tracks how often each branch of the tree has been selected recently,
/// indexing trie nodes by position in `nodes` rather than raw pointers
/// the way the original's `std::vector<TrieNode>` arena does.
pub struct RecentSelectionPath {
    nodes: Vec<TrieNode>,
}

impl RecentSelectionPath {
    pub fn new() -> Self {
        Self { nodes: vec![TrieNode { count: 0, node_index: gs_mcts::tree::NONE, children: HashMap::new() }] }
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
        self.nodes.push(TrieNode { count: 0, node_index: gs_mcts::tree::NONE, children: HashMap::new() });
    }

    pub fn root_count(&self) -> u32 {
        self.nodes[0].count
    }

    fn action_id(action: Action) -> usize {
        match action {
            Action::Pass => usize::MAX,
            Action::Play(pos) => pos,
        }
    }

    /// Folds one selection path into the trie, mirroring
    /// `RecentSelectionPath::addSelectionPath`.
    pub fn add_selection_path(&mut self, tree: &Tree, node_path: &[i32]) {
        let mut trie_index = 0;
        for &node_index in &node_path[1..] {
            let action_id = Self::action_id(tree.get(node_index).action);
            let child_index = match self.nodes[trie_index].children.get(&action_id) {
                Some(&child_index) => child_index,
                None => {
                    let child_index = self.nodes.len();
                    self.nodes.push(TrieNode { count: 0, node_index, children: HashMap::new() });
                    self.nodes[trie_index].children.insert(action_id, child_index);
                    child_index
                }
            };
            self.nodes[trie_index].count += 1;
            trie_index = child_index;
        }
    }

    /// Returns the SGF move-node suffix (`;B[ab];W[cd])`) for every branch
    /// whose count clears `root_count * m / n` and whose tree node is
    /// still unsolved, matching `RecentSelectionPath::summarize`.
    pub fn summarize(&self, tree: &Tree, board_size: usize, critical_m: u32, critical_n: u32) -> Vec<String> {
        let threshold = (self.nodes[0].count as u64 * critical_m as u64) / critical_n.max(1) as u64;
        let mut out = Vec::new();
        let mut prefix = String::new();
        self.summarize_from(tree, 0, board_size, threshold as u32, &mut prefix, &mut out);
        out
    }

    fn summarize_from(&self, tree: &Tree, trie_index: usize, board_size: usize, threshold: u32, prefix: &mut String, out: &mut Vec<String>) {
        let mut any_child_emitted = false;
        for &child_index in self.nodes[trie_index].children.values() {
            let child = &self.nodes[child_index];
            if child.count < threshold {
                continue;
            }

            let node = tree.get(child.node_index);
            let sgf_move = gs_env::sgf::encode(&[(node.player, node.action)], board_size);
            prefix.push_str(&sgf_move);
            any_child_emitted = true;
            self.summarize_from(tree, child_index, board_size, threshold, prefix, out);
            prefix.truncate(prefix.len() - sgf_move.len());
        }

        let node = &self.nodes[trie_index];
        if !any_child_emitted && trie_index != 0 && node.node_index != gs_mcts::tree::NONE && !tree.get(node.node_index).is_solved() {
            out.push(format!("{})", prefix));
        }
    }
}

impl Default for RecentSelectionPath {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_mcts::tree::Tree;

    fn sample_tree() -> (Tree, Vec<i32>) {
        let mut tree = Tree::new(Player::Black, 1.4);
        tree.expand(0, Player::Black, &[(Action::Play(0), 1.0)]);
        let child = tree.get(0).children[0];
        (tree, vec![0, child])
    }

    #[test]
    fn summarize_is_empty_below_threshold() {
        let (tree, path) = sample_tree();
        let mut trie = RecentSelectionPath::new();
        trie.add_selection_path(&tree, &path);

        let summary = trie.summarize(&tree, 3, 100, 1_000);
        assert!(summary.is_empty());
    }

    #[test]
    fn summarize_emits_branch_above_threshold() {
        let (tree, path) = sample_tree();
        let mut trie = RecentSelectionPath::new();
        for _ in 0..10 {
            trie.add_selection_path(&tree, &path);
        }

        let summary = trie.summarize(&tree, 3, 1, 10);
        assert_eq!(summary.len(), 1);
        assert!(summary[0].starts_with(";B[aa]"));
    }

    #[test]
    fn reset_clears_accumulated_counts() {
        let (tree, path) = sample_tree();
        let mut trie = RecentSelectionPath::new();
        trie.add_selection_path(&tree, &path);
        assert_eq!(trie.root_count(), 1);

        trie.reset();
        assert_eq!(trie.root_count(), 0);
    }
}
