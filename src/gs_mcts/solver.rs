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

//! The solver proper: MCTS selection combined with AND/OR solver-status
//! propagation, R-zone pruning and the R-zone TT, ported from
//! `base_solver.cpp`. Node identity is an arena index (`i32`) rather than
//! a raw `GSMCTSNode*`, so `node_path` is `Vec<i32>` throughout.

use gs_core::config::Config;
use gs_env::{Action, Environment, Player};
use gs_nn::{PredictRequest, Predictor};

use crate::knowledge::KnowledgeHandler;
use crate::rzone::{RZoneHandler, TreeRZoneData, ZonePattern};
use crate::tree::{SolverStatus, Tree, NONE};
use crate::tt::RZoneTtHandler;

/// Aggregated GHI information for a solved subtree, matching `GHIData`:
/// every R-zone pattern found on an in-loop node belonging to the solved
/// player, plus the shallowest such node's distance from the root.
#[derive(Debug, Default)]
pub struct GhiData {
    pub patterns: Vec<usize>,
    pub min_loop_offset_before_root: i32,
}

pub struct Solver<E, R, K> {
    pub tree: Tree,
    pub rzone_data: TreeRZoneData,
    pub tt_handler: RZoneTtHandler,
    pub rzone_handler: R,
    pub knowledge_handler: K,
    pub config: Config,
    pub solved_player: Player,
    root_env: E,
}

impl<E, R, K> Solver<E, R, K>
where
    E: Environment,
    R: RZoneHandler<E>,
    K: KnowledgeHandler<E>,
{
    pub fn new(root_env: E, rzone_handler: R, knowledge_handler: K, config: Config, solved_player: Player) -> Self {
        let tt_handler = RZoneTtHandler::new(config.rzone_tt_block_bits, config.rzone_tt_grid_bits);

        Self {
            tree: Tree::new(root_env.turn(), config.puct_constant),
            rzone_data: TreeRZoneData::new(),
            tt_handler,
            rzone_handler,
            knowledge_handler,
            config,
            solved_player,
            root_env,
        }
    }

    pub fn is_search_done(&self) -> bool {
        self.tree.get(self.tree.root()).is_solved() || self.tree.len() as u32 >= self.config.num_rollouts
    }

    /// Replays the actions along `node_path` onto a clone of the root
    /// environment, matching `getEnvironmentTransition`.
    fn env_transition(&self, node_path: &[i32]) -> E {
        let mut env = self.root_env.clone();
        for &index in &node_path[1..] {
            env.apply(self.tree.get(index).action);
        }
        env
    }

    /// Public entry point for callers outside this module (the manager)
    /// that need the position at the end of `node_path` -- e.g. to decide
    /// whether a leaf is terminal before dispatching it to a worker.
    pub fn env_transition_of(&self, node_path: &[i32]) -> E {
        self.env_transition(node_path)
    }

    pub fn root_env(&self) -> &E {
        &self.root_env
    }

    /// `GSMCTS::backup`'s proof-cost transform, exposed so every caller
    /// that backs up a value (this solver's own rollouts, and the
    /// manager's both for a freshly-expanded leaf and for a job result
    /// returned by a worker) applies the identical penalty rather than
    /// three drifting copies of it. Adds `log10(|A|)` for every ply on
    /// `node_path` made by a player other than the solved player, then
    /// clamps into `[0, VMAX]` where `VMAX = nn_discrete_value_size - 1`.
    pub fn proof_cost_value(&self, node_path: &[i32], raw_value: f32) -> f32 {
        let action_size = (self.root_env.num_positions() + 1) as f32;
        let vmax = (self.config.nn_discrete_value_size - 1) as f32;

        let mut value = raw_value;
        for &index in &node_path[1..] {
            if self.tree.get(index).player != self.solved_player {
                value += action_size.log10();
            }
        }

        value.max(0.0).min(vmax)
    }

    /// Exposes the block-TT lookup-and-propagate step `selection` uses at
    /// each descent, so a caller driving its own selection loop (the
    /// manager, which widens at opponent nodes and restarts on a
    /// virtual-solved dead end) gets the identical TT behavior rather than
    /// a re-implementation that could drift from it.
    pub fn find_tt_and_update_solver_status_pub(&mut self, env: &E, node_path: &[i32]) -> bool {
        self.find_tt_and_update_solver_status(env, node_path)
    }

    /// `BaseSolver::selection`: walks down from the root by PUCT score,
    /// restarting from the root whenever a TT hit resolves a node's
    /// status mid-descent (unless that resolves the whole search).
    pub fn selection(&mut self) -> Vec<i32> {
        loop {
            let mut node = self.tree.root();
            let mut node_path = vec![node];
            let mut env = self.root_env.clone();

            if self.find_tt_and_update_solver_status(&env, &node_path) {
                if self.is_search_done() {
                    return node_path;
                }
                continue;
            }

            loop {
                if self.tree.get(node).is_leaf() {
                    return node_path;
                }
                node = self.tree.select_child_by_puct(node).expect("plain solver never sets virtual_solved");
                node_path.push(node);
                env.apply(self.tree.get(node).action);

                if self.find_tt_and_update_solver_status(&env, &node_path) {
                    if self.is_search_done() {
                        return node_path;
                    }
                    break;
                }
            }
        }
    }

    /// `BaseSolver::think`'s per-rollout body: `beforeNNEvaluation` +
    /// `afterNNEvaluation` collapsed into one synchronous step since this
    /// workspace's `Predictor` has no async batching boundary to straddle.
    /// Runs one selection, checks the leaf for a definite game-theoretic
    /// result, and either backs up a solved status or expands the leaf
    /// with the predictor's policy/value and backs up the value.
    pub fn run_simulation(&mut self, predictor: &dyn Predictor) {
        let node_path = self.selection();
        if self.is_search_done() {
            return;
        }

        let leaf = *node_path.last().unwrap();
        let leaf_env = self.env_transition(&node_path);

        if let Some(winner) = self.knowledge_handler.winner(&leaf_env, self.solved_player) {
            let rzone = self.rzone_handler.winner_rzone_of_leaf(&leaf_env);
            let mover = self.tree.get(leaf).player;
            let status = if mover == winner { SolverStatus::Win } else { SolverStatus::Loss };
            self.update_solver_status(status, node_path, rzone);
            return;
        }

        let num_positions = leaf_env.num_positions();
        let mut features = vec![0.0f32; 2 * num_positions];
        for pos in leaf_env.stones(leaf_env.turn()).iter() {
            features[pos] = 1.0;
        }
        for pos in leaf_env.stones(!leaf_env.turn()).iter() {
            features[num_positions + pos] = 1.0;
        }

        let response = predictor.predict(&PredictRequest {
            hash_key: leaf_env.hash_key(),
            turn: leaf_env.turn(),
            features,
        });

        let legal_actions = leaf_env.legal_actions();
        let uniform = if legal_actions.is_empty() { 0.0 } else { 1.0 / legal_actions.len() as f32 };
        let priors: Vec<(Action, f32)> = legal_actions
            .into_iter()
            .enumerate()
            .map(|(i, action)| (action, response.policy.get(i).copied().unwrap_or(uniform)))
            .collect();

        self.tree.expand(leaf, leaf_env.turn(), &priors);
        let root_value = self.proof_cost_value(&node_path, response.value);
        self.tree.backup(&node_path, root_value);
    }

    /// `BaseSolver::updateSolverStatus`: back-propagates a definite
    /// status from a leaf up to the root, flipping win/loss at each
    /// level and triggering R-zone maintenance along the way.
    pub fn update_solver_status(&mut self, status: SolverStatus, mut node_path: Vec<i32>, rzone: gs_core::bitboard::Bitboard) {
        assert!(status != SolverStatus::Unknown);

        let leaf_env = self.env_transition(&node_path);
        let leaf = *node_path.last().unwrap();
        self.tree.get_mut(leaf).solver_status = status;
        let pattern = self.rzone_handler.extract_zone_pattern(&leaf_env, rzone);
        self.set_node_rzone(leaf, pattern);

        while node_path.len() >= 2 {
            let node = node_path[node_path.len() - 1];
            let parent = node_path[node_path.len() - 2];
            node_path.pop();
            let env_transition = self.env_transition(&node_path);

            match self.tree.get(node).solver_status {
                SolverStatus::Win => {
                    self.tree.get_mut(parent).solver_status = SolverStatus::Loss;
                    if self.config.use_rzone {
                        self.update_winner_rzone(&env_transition, parent, node);
                    }
                }
                SolverStatus::Loss => {
                    if self.config.use_rzone {
                        self.prune_nodes_outside_rzone(&env_transition, parent, node);
                    }
                    if self.is_all_children_solution_loss(parent) {
                        self.tree.get_mut(parent).solver_status = SolverStatus::Win;
                        if self.config.use_rzone {
                            self.update_loser_rzone(&env_transition, parent);
                            if self.config.use_ghi_check {
                                self.knowledge_handler.find_ghi(&env_transition, &node_path, &mut self.tree);
                            }
                        }
                    } else {
                        break;
                    }
                }
                SolverStatus::Unknown => unreachable!("status must be definite before backup"),
            }
        }
    }

    fn update_winner_rzone(&mut self, env: &E, parent: i32, child: i32) {
        let child_rzone = self.rzone_data.get(self.tree.get(child).rzone_data_index).rzone();
        let child_action = self.tree.get(child).action;
        let parent_rzone = self.rzone_handler.winner_rzone_from_child(env, child_rzone, child_action);
        let pattern = self.rzone_handler.extract_zone_pattern(env, parent_rzone);
        self.set_node_rzone(parent, pattern);
        self.store_tt(parent, env, child_action.position());
    }

    fn prune_nodes_outside_rzone(&mut self, env: &E, parent: i32, node: i32) {
        let rzone_index = self.tree.get(node).rzone_data_index;
        if rzone_index == NONE {
            return;
        }
        let child_rzone = self.rzone_data.get(rzone_index).rzone();
        if self.rzone_handler.is_relevant_move(env, child_rzone, self.tree.get(node).action) {
            return;
        }

        let children = self.tree.get(parent).children.clone();
        for child in children {
            if self.tree.get(child).solver_status != SolverStatus::Unknown {
                continue;
            }
            let outside = self.tree.get(child).action.position().map(|pos| !child_rzone.test(pos)).unwrap_or(true);
            if outside {
                self.tree.get_mut(child).solver_status = SolverStatus::Loss;
                self.tree.get_mut(child).equal_loss_node = node;
            }
        }
    }

    fn is_all_children_solution_loss(&self, node: i32) -> bool {
        self.tree
            .get(node)
            .children
            .iter()
            .all(|&child| self.tree.get(child).solver_status == SolverStatus::Loss)
    }

    fn update_loser_rzone(&mut self, env: &E, parent: i32) {
        let mut union = gs_core::bitboard::Bitboard::new();
        for &child in &self.tree.get(parent).children.clone() {
            let rzone_index = self.tree.get(child).rzone_data_index;
            if rzone_index == NONE {
                continue;
            }
            union |= self.rzone_data.get(rzone_index).rzone();
        }

        let player = self.tree.get(parent).player;
        let parent_rzone = self.rzone_handler.loser_rzone(env, union, player);
        let pattern = self.rzone_handler.extract_zone_pattern(env, parent_rzone);
        self.set_node_rzone(parent, pattern);
        self.store_tt(parent, env, None);
    }

    fn set_node_rzone(&mut self, node: i32, pattern: ZonePattern) {
        let match_tt = self.tree.get(node).match_tt_node;
        let rzone_index = if match_tt != NONE {
            self.tree.get(match_tt).rzone_data_index
        } else {
            self.rzone_data.store(pattern)
        };
        self.tree.get_mut(node).rzone_data_index = rzone_index;
    }

    /// `BaseSolver::findTTAndUpdateSolverStatus`: looks up the current
    /// leaf of `node_path` in the block-TT, rejecting the hit (and
    /// falling through to ordinary search) if GHI makes the cached
    /// result unsafe to reuse.
    fn find_tt_and_update_solver_status(&mut self, env: &E, node_path: &[i32]) -> bool {
        let node = *node_path.last().unwrap();
        let sequence = self.knowledge_handler.hash_key_sequence(env, self.solved_player);
        let start_id = self.tree.get(node).tt_start_lookup_id as i64;

        let rzone_data = &self.rzone_data;
        let tree = &self.tree;
        let rzone_handler = &self.rzone_handler;
        let found = self.tt_handler.lookup_tt(self.config.use_block_tt, self.config.use_grid_tt, &sequence, start_id, |pattern| {
            rzone_handler.pattern_matches(env, pattern, rzone_data) && pattern.node_index != NONE && tree.get(pattern.node_index).rzone_data_index != NONE
        });

        let pattern = match found {
            Some(pattern) => pattern,
            None => {
                self.tree.get_mut(node).tt_start_lookup_id = self.tt_handler.current_tt_size() as i32;
                return false;
            }
        };

        let mut can_use_tt = true;
        if self.config.use_ghi_check {
            let ancestors = self.knowledge_handler.ancestor_positions(env, node_path);
            if !self.is_valid_simulation(pattern.node_index, &ancestors) {
                can_use_tt = false;
            }
        }

        if !can_use_tt {
            return false;
        }

        self.tree.get_mut(node).match_tt_node = pattern.node_index;
        let status = self.tree.get(pattern.node_index).solver_status;
        let rzone = self.rzone_data.get(self.tree.get(pattern.node_index).rzone_data_index).rzone();
        self.update_solver_status(status, node_path.to_vec(), rzone);

        true
    }

    fn store_tt(&mut self, node: i32, env: &E, winner_action_position: Option<usize>) {
        if self.tree.get(node).in_loop {
            return;
        }
        let mut pattern = self.rzone_handler.extract_tt_pattern(env, self.tree.get(node), winner_action_position);
        pattern.node_index = node;
        let sequence = self.knowledge_handler.hash_key_sequence(env, self.solved_player);
        self.tt_handler.store_tt(self.config.use_block_tt, self.config.use_grid_tt, &sequence, pattern);
    }

    /// `BaseSolver::isValidSimulation`: a cached solved node remains safe
    /// to reuse unless it is GHI-flagged, on the solved player's move,
    /// inside a loop, and its R-zone pattern recurs among `ancestors`
    /// (meaning reusing it would hide a repetition the real game forbids).
    fn is_valid_simulation(&self, node: i32, ancestors: &[crate::knowledge::PositionPair]) -> bool {
        let n = self.tree.get(node);
        if !n.is_solved() || !n.ghi || n.equal_loss_node != NONE {
            return true;
        }

        if n.in_loop && n.player == self.solved_player {
            let pattern = self.rzone_data.get(n.rzone_data_index);
            if Self::has_rzone_pattern_in_positions(pattern, ancestors) {
                return false;
            }
        }

        for &child in &n.children {
            let next = if self.tree.get(child).match_tt_node != NONE {
                self.tree.get(child).match_tt_node
            } else {
                child
            };
            if !self.is_valid_simulation(next, ancestors) {
                return false;
            }
        }

        true
    }

    pub fn collect_ghi_info(&self, node: i32, ghi_data: &mut GhiData) {
        let n = self.tree.get(node);
        if !n.is_solved() || !n.ghi || n.equal_loss_node != NONE {
            return;
        }

        if n.in_loop && n.player == self.solved_player {
            ghi_data.patterns.push(n.rzone_data_index as usize);
            if let Some(offset) = self.tree.ghi_node_offset(node) {
                if offset < ghi_data.min_loop_offset_before_root {
                    ghi_data.min_loop_offset_before_root = offset;
                }
            }
        }

        for &child in &n.children.clone() {
            let next = if self.tree.get(child).match_tt_node != NONE {
                self.tree.get(child).match_tt_node
            } else {
                child
            };
            self.collect_ghi_info(next, ghi_data);
        }
    }

    fn has_rzone_pattern_in_positions(pattern: &ZonePattern, ancestors: &[crate::knowledge::PositionPair]) -> bool {
        ancestors.iter().any(|position| {
            let black_in_zone = position.black & pattern.rzone();
            let white_in_zone = position.white & pattern.rzone();
            black_in_zone == pattern.stones_in_zone(Player::Black) && white_in_zone == pattern.stones_in_zone(Player::White)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::HexKnowledgeHandler;
    use crate::rzone::HexRZoneHandler;
    use gs_env::hex::HexEnvironment;

    fn new_solver() -> Solver<HexEnvironment, HexRZoneHandler, HexKnowledgeHandler> {
        let env = HexEnvironment::new(3);
        let mut config = Config::new();
        config.use_ghi_check = false;
        Solver::new(env, HexRZoneHandler, HexKnowledgeHandler, config, Player::Black)
    }

    #[test]
    fn root_starts_unsolved() {
        let solver = new_solver();
        assert!(!solver.tree.get(solver.tree.root()).is_solved());
    }

    #[test]
    fn update_solver_status_propagates_win_to_loss() {
        let mut solver = new_solver();
        let root = solver.tree.root();
        solver.tree.expand(root, Player::Black, &[(Action::Play(0), 1.0)]);
        let child = solver.tree.get(root).children[0];

        let rzone = gs_core::bitboard::Bitboard::new();
        solver.update_solver_status(SolverStatus::Win, vec![root, child], rzone);

        assert_eq!(solver.tree.get(child).solver_status, SolverStatus::Win);
        assert_eq!(solver.tree.get(root).solver_status, SolverStatus::Loss);
    }

    #[test]
    fn all_children_loss_flips_parent_to_win() {
        let mut solver = new_solver();
        let root = solver.tree.root();
        solver.tree.expand(root, Player::Black, &[(Action::Play(0), 0.5), (Action::Play(1), 0.5)]);
        let children = solver.tree.get(root).children.clone();

        let rzone = gs_core::bitboard::Bitboard::new();
        solver.update_solver_status(SolverStatus::Loss, vec![root, children[0]], rzone);
        assert!(!solver.tree.get(root).is_solved());

        let rzone = gs_core::bitboard::Bitboard::new();
        solver.update_solver_status(SolverStatus::Loss, vec![root, children[1]], rzone);
        assert_eq!(solver.tree.get(root).solver_status, SolverStatus::Win);
    }

    #[test]
    fn run_simulation_expands_the_root_on_first_call() {
        let mut solver = new_solver();
        solver.run_simulation(&gs_nn::predictor::UniformPredictor);

        assert!(!solver.tree.get(solver.tree.root()).is_leaf());
        assert_eq!(solver.tree.get(solver.tree.root()).visit_count, 1);
    }

    #[test]
    fn run_simulation_solves_a_trivial_one_cell_board() {
        // a single-cell board is solved the instant black plays it: black's
        // top row and bottom row are the same row, so the connection is
        // immediate.
        let env = HexEnvironment::new(1);
        let mut config = Config::new();
        config.use_ghi_check = false;
        let mut solver = Solver::new(env, HexRZoneHandler, HexKnowledgeHandler, config, Player::Black);

        for _ in 0..4 {
            if solver.is_search_done() {
                break;
            }
            solver.run_simulation(&gs_nn::predictor::UniformPredictor);
        }

        assert!(solver.tree.get(solver.tree.root()).is_solved());
        assert_eq!(solver.tree.get(solver.tree.root()).solver_status, SolverStatus::Loss);
    }
}
