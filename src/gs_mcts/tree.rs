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

//! The search tree as an arena of `Node`s addressed by `i32` index rather
//! than the original's raw `GSMCTSNode*` graph -- there is no ownership
//! cycle to manage and node identity survives moves of the backing
//! `Vec` the way a pointer would not.

use std::collections::{BTreeMap, HashMap};

use gs_env::{Action, Player};
use ordered_float::OrderedFloat;
use rand::seq::SliceRandom;
use rand::Rng;

pub const NONE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Unknown,
    Win,
    Loss,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: i32,
    pub children: Vec<i32>,
    pub action: Action,
    /// The player who made `action` to reach this node.
    pub player: Player,
    pub visit_count: u32,
    pub value_sum: f32,
    pub policy_prior: f32,
    pub solver_status: SolverStatus,
    pub rzone_data_index: i32,
    pub match_tt_node: i32,
    pub equal_loss_node: i32,
    /// Set once this node is recognized as being inside a repeated
    /// sequence of positions (a ko cycle in Killall-Go); see §4.5.
    pub ghi: bool,
    pub in_loop: bool,
    pub tt_start_lookup_id: i32,
    /// Pending visits from a leaf dispatched to a remote worker but not
    /// yet resolved; kept separate from `visit_count` so a manager can
    /// discount it back out once the job returns, matching
    /// `MCTSNode::addVirtualLoss`/`removeVirtualLoss`.
    pub virtual_loss: u32,
    /// Set while a leaf (or an ancestor forced to it) is occupied by an
    /// in-flight job, so the manager's selection does not re-dispatch it.
    pub virtual_solved: bool,
}

impl Node {
    fn new(parent: i32, action: Action, player: Player, policy_prior: f32) -> Self {
        Self {
            parent,
            children: Vec::new(),
            action,
            player,
            visit_count: 0,
            value_sum: 0.0,
            policy_prior,
            solver_status: SolverStatus::Unknown,
            rzone_data_index: NONE,
            match_tt_node: NONE,
            equal_loss_node: NONE,
            ghi: false,
            in_loop: false,
            tt_start_lookup_id: 0,
            virtual_loss: 0,
            virtual_solved: false,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_solved(&self) -> bool {
        self.solver_status != SolverStatus::Unknown
    }

    pub fn mean_value(&self) -> f32 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.value_sum / self.visit_count as f32
        }
    }
}

/// The node arena plus the PUCT selection policy used to walk it. Holds
/// no game rules of its own -- `Environment` and `RZoneHandler`/
/// `KnowledgeHandler` supply those.
pub struct Tree {
    nodes: Vec<Node>,
    puct_constant: f32,
    /// Nodes whose `findGHI` loop match landed above the node_path's own
    /// root, keyed by node index with the (negative) offset past that
    /// root -- `GSMCTS::ghi_nodes_map_`. Consulted by `collect_ghi_info`
    /// to report a loop that crosses a subtree boundary.
    ghi_nodes: HashMap<i32, i32>,
    /// Every live node's current mean, counted by value -- `GSMCTS`'s
    /// `tree_value_map_`. Its min/max bracket the Q range PUCT selection
    /// normalizes against, so one outlier backup can't swamp the
    /// exploration term at every other node in the tree.
    value_multiset: BTreeMap<OrderedFloat<f32>, u32>,
}

impl Tree {
    pub fn new(root_player: Player, puct_constant: f32) -> Self {
        let root = Node::new(NONE, Action::Pass, root_player, 1.0);

        let mut value_multiset = BTreeMap::new();
        value_multiset.insert(OrderedFloat(root.mean_value()), 1);

        Self {
            nodes: vec![root],
            puct_constant,
            ghi_nodes: HashMap::new(),
            value_multiset,
        }
    }

    /// `GSMCTS::addGHINodes`.
    pub fn add_ghi_node(&mut self, node: i32, loop_above_offset: i32) {
        self.ghi_nodes.insert(node, loop_above_offset);
    }

    /// `GSMCTS::getGHINodeMap`'s single-key lookup.
    pub fn ghi_node_offset(&self, node: i32) -> Option<i32> {
        self.ghi_nodes.get(&node).copied()
    }

    pub fn root(&self) -> i32 {
        0
    }

    pub fn get(&self, index: i32) -> &Node {
        &self.nodes[index as usize]
    }

    pub fn get_mut(&mut self, index: i32) -> &mut Node {
        &mut self.nodes[index as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Expands `parent` with one child per `(action, prior)` pair. The
    /// child's `player` is whoever is to move in `parent` -- the player
    /// making `action`.
    pub fn expand(&mut self, parent: i32, mover: Player, priors: &[(Action, f32)]) {
        for &(action, prior) in priors {
            let child = Node::new(parent, action, mover, prior);
            *self.value_multiset.entry(OrderedFloat(child.mean_value())).or_insert(0) += 1;
            let child_index = self.nodes.len() as i32;
            self.nodes.push(child);
            self.nodes[parent as usize].children.push(child_index);
        }
    }

    /// The `(min, max)` bracket of every live node's mean, or `(0, 0)` if
    /// the tree is somehow empty of entries -- `GSMCTS::tree_value_map_`'s
    /// range, used to normalize the exploitation term of PUCT selection.
    pub fn value_range(&self) -> (f32, f32) {
        let min = self.value_multiset.keys().next().copied().unwrap_or(OrderedFloat(0.0));
        let max = self.value_multiset.keys().next_back().copied().unwrap_or(OrderedFloat(0.0));
        (min.into_inner(), max.into_inner())
    }

    /// `GSMCTS::updateTreeValueMap`: moves one node's count from its old
    /// mean bucket to its new one after a backup changes that mean.
    fn update_tree_value_map(&mut self, original_mean: f32, new_mean: f32) {
        let key = OrderedFloat(original_mean);
        if let Some(count) = self.value_multiset.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.value_multiset.remove(&key);
            }
        }
        *self.value_multiset.entry(OrderedFloat(new_mean)).or_insert(0) += 1;
    }

    /// Picks the still-unsolved, not-virtual-solved child of `parent`
    /// maximizing the PUCT score, matching `GSMCTS::selectChildByPUCTScore`.
    /// Returns `None` if every child is solved or out on a virtual-solved
    /// job -- the plain solver never sets `virtual_solved` so this is a
    /// no-op filter for it, but the manager's selection uses it to detect
    /// "nothing left to descend into here" and restart from the root.
    pub fn select_child_by_puct(&self, parent: i32) -> Option<i32> {
        let parent_node = &self.nodes[parent as usize];
        let total_visits = parent_node.visit_count.max(1) as f32;
        let (min_value, max_value) = self.value_range();
        let value_span = (max_value - min_value).max(f32::EPSILON);

        parent_node
            .children
            .iter()
            .copied()
            .filter(|&child| self.nodes[child as usize].solver_status == SolverStatus::Unknown)
            .filter(|&child| !self.nodes[child as usize].virtual_solved)
            .max_by_key(|&child| {
                let node = &self.nodes[child as usize];
                let exploitation = (node.mean_value() - min_value) / value_span;
                let exploration = self.puct_constant * node.policy_prior * total_visits.sqrt()
                    / (1.0 + node.visit_count as f32);

                OrderedFloat(exploitation + exploration)
            })
    }

    /// Picks uniformly at random among the `top_k` still-unsolved,
    /// not-virtual-solved children of `parent` ranked by PUCT score,
    /// matching `MCTS::selectChildByPUCTScore(node, top_k, true)`'s use at
    /// opponent-turn nodes to broaden the manager's search tree.
    pub fn select_top_k_random(&self, parent: i32, top_k: usize, rng: &mut impl Rng) -> Option<i32> {
        let parent_node = &self.nodes[parent as usize];
        let total_visits = parent_node.visit_count.max(1) as f32;
        let (min_value, max_value) = self.value_range();
        let value_span = (max_value - min_value).max(f32::EPSILON);

        let mut ranked: Vec<(OrderedFloat<f32>, i32)> = parent_node
            .children
            .iter()
            .copied()
            .filter(|&child| self.nodes[child as usize].solver_status == SolverStatus::Unknown)
            .filter(|&child| !self.nodes[child as usize].virtual_solved)
            .map(|child| {
                let node = &self.nodes[child as usize];
                let exploitation = (node.mean_value() - min_value) / value_span;
                let exploration = self.puct_constant * node.policy_prior * total_visits.sqrt()
                    / (1.0 + node.visit_count as f32);
                (OrderedFloat(exploitation + exploration), child)
            })
            .collect();

        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        let width = top_k.min(ranked.len()).max(1);
        ranked.truncate(width);

        ranked.choose(rng).map(|&(_, child)| child)
    }

    pub fn add_virtual_loss(&mut self, path: &[i32]) {
        for &index in path {
            self.nodes[index as usize].virtual_loss += 1;
        }
    }

    pub fn remove_virtual_loss(&mut self, path: &[i32], count: u32) {
        for &index in path {
            let node = &mut self.nodes[index as usize];
            node.virtual_loss = node.virtual_loss.saturating_sub(count);
        }
    }

    /// `GSMCTS::backup`: every node on `path` receives the identical
    /// `root_value` (a proof-cost scalar is a distance, not a signed
    /// win probability, so there is no perspective to flip between
    /// plies the way a plain value backup would).
    pub fn backup(&mut self, path: &[i32], root_value: f32) {
        for &index in path {
            let node = &mut self.nodes[index as usize];
            let original_mean = node.mean_value();
            node.visit_count += 1;
            node.value_sum += root_value;
            let new_mean = node.mean_value();
            self.update_tree_value_map(original_mean, new_mean);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_creates_children_under_parent() {
        let mut tree = Tree::new(Player::Black, 1.4);
        tree.expand(0, Player::Black, &[(Action::Play(0), 0.5), (Action::Play(1), 0.5)]);

        assert_eq!(tree.get(0).children.len(), 2);
        assert!(!tree.get(0).is_leaf());
        assert!(tree.get(1).is_leaf());
    }

    #[test]
    fn select_child_by_puct_prefers_unvisited_high_prior() {
        let mut tree = Tree::new(Player::Black, 1.4);
        tree.expand(
            0,
            Player::Black,
            &[(Action::Play(0), 0.1), (Action::Play(1), 0.9)],
        );
        tree.get_mut(0).visit_count = 1;

        let selected = tree.select_child_by_puct(0).expect("an unsolved child exists");
        assert_eq!(tree.get(selected).action, Action::Play(1));
    }

    #[test]
    fn select_top_k_random_only_returns_unsolved_children() {
        let mut tree = Tree::new(Player::Black, 1.4);
        tree.expand(
            0,
            Player::Black,
            &[(Action::Play(0), 0.4), (Action::Play(1), 0.3), (Action::Play(2), 0.3)],
        );
        tree.get_mut(0).visit_count = 3;
        let solved_child = tree.get(0).children[2];
        tree.get_mut(solved_child).solver_status = SolverStatus::Win;

        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let selected = tree.select_top_k_random(0, 2, &mut rng).expect("two unsolved children remain");
            assert_ne!(selected, solved_child);
        }
    }

    #[test]
    fn select_top_k_random_skips_virtual_solved_children() {
        let mut tree = Tree::new(Player::Black, 1.4);
        tree.expand(0, Player::Black, &[(Action::Play(0), 0.5), (Action::Play(1), 0.5)]);
        tree.get_mut(0).visit_count = 2;
        let busy_child = tree.get(0).children[0];
        tree.get_mut(busy_child).virtual_solved = true;

        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let selected = tree.select_top_k_random(0, 2, &mut rng).expect("one free child remains");
            assert_ne!(selected, busy_child);
        }
    }

    #[test]
    fn select_child_by_puct_skips_solved_children() {
        let mut tree = Tree::new(Player::Black, 1.4);
        tree.expand(
            0,
            Player::Black,
            &[(Action::Play(0), 0.9), (Action::Play(1), 0.1)],
        );
        tree.get_mut(1).solver_status = SolverStatus::Win;
        tree.get_mut(0).visit_count = 1;

        let selected = tree.select_child_by_puct(0).expect("one unsolved child remains");
        assert_eq!(tree.get(selected).action, Action::Play(1));
    }

    #[test]
    fn select_child_by_puct_returns_none_when_all_children_unavailable() {
        let mut tree = Tree::new(Player::Black, 1.4);
        tree.expand(0, Player::Black, &[(Action::Play(0), 1.0)]);
        let only_child = tree.get(0).children[0];
        tree.get_mut(only_child).virtual_solved = true;

        assert!(tree.select_child_by_puct(0).is_none());
    }
}
