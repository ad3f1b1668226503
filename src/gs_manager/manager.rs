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

use std::thread;
use std::time::Duration;

use gs_broker::{JobHandler, SolverJob};
use gs_core::config::Config;
use gs_env::{Environment, Player};
use gs_mcts::knowledge::KnowledgeHandler;
use gs_mcts::rzone::RZoneHandler;
use gs_mcts::tree::{SolverStatus, NONE};
use gs_mcts::Solver;
use gs_nn::{PredictRequest, Predictor};

use crate::recent_selection_path::RecentSelectionPath;

/// Drives `solver` across a whole game: runs the same PUCT selection as a
/// plain worker, but widens the tree at opponent nodes, dispatches
/// tractable-looking leaves to remote solvers, and folds their results
/// back in. Grounded in `manager.cpp`'s `Manager`.
pub struct Manager<E, R, K> {
    pub solver: Solver<E, R, K>,
    job_handler: JobHandler,
    /// Moves already played in the real game before this search began --
    /// `solver`'s root environment has no action history of its own, so
    /// the manager carries it separately to build a job's SGF string.
    opening_moves: Vec<(Player, gs_env::Action)>,
    recent_selection_path: RecentSelectionPath,
    quit: bool,
}

impl<E, R, K> Manager<E, R, K>
where
    E: Environment,
    R: RZoneHandler<E>,
    K: KnowledgeHandler<E>,
{
    pub fn new(solver: Solver<E, R, K>, job_handler: JobHandler, opening_moves: Vec<(Player, gs_env::Action)>) -> Self {
        Self {
            solver,
            job_handler,
            opening_moves,
            recent_selection_path: RecentSelectionPath::new(),
            quit: false,
        }
    }

    pub fn is_search_done(&self) -> bool {
        self.quit || self.solver.is_search_done()
    }

    pub fn reset_search(&mut self) {
        self.recent_selection_path.reset();
    }

    /// One iteration of `Manager::solve`'s loop body: select, evaluate (or
    /// dispatch), fold in any job results, and service broadcast commands.
    pub fn step(&mut self, predictor: &dyn Predictor) {
        if self.is_search_done() {
            return;
        }

        self.run_simulation(predictor);
        self.handle_solver_job_results();
        self.handle_job_commands();
        self.broadcast_critical_positions();
    }

    /// `Manager::selection`: as `Solver::selection`, but widens via random
    /// top-K at nodes whose incoming move belongs to the opponent (i.e.
    /// where it is the solved player's turn to pick the next action), and
    /// restarts from the root when every candidate child is solved or
    /// tied up in an outstanding job.
    pub fn selection(&mut self) -> Vec<i32> {
        let mut rng = rand::thread_rng();

        loop {
            let root = self.solver.tree.root();
            let mut node = root;
            let mut node_path = vec![node];
            let mut env = self.solver.root_env().clone();

            if self.solver.find_tt_and_update_solver_status_pub(&env, &node_path) {
                if self.solver.is_search_done() {
                    return node_path;
                }
                continue;
            }

            let mut restart = false;
            loop {
                if self.solver.tree.get(node).is_leaf() {
                    return node_path;
                }

                let root_virtual_solved = self.solver.tree.get(root).virtual_solved;
                let widen = !root_virtual_solved && self.solver.tree.get(node).player != self.solver.solved_player;
                let next_node = if widen && self.solver.tree.get(node).visit_count as usize >= self.solver.config.manager_top_k_selection {
                    self.solver.tree.select_top_k_random(node, self.solver.config.manager_top_k_selection, &mut rng)
                } else {
                    self.solver.tree.select_child_by_puct(node)
                };

                let next_node = match next_node {
                    Some(next_node) => next_node,
                    None => {
                        let parent = if node_path.len() >= 2 { node_path[node_path.len() - 2] } else { NONE };
                        self.add_virtual_solved_node(node, parent);
                        restart = true;
                        break;
                    }
                };

                node = next_node;
                node_path.push(node);
                env.apply(self.solver.tree.get(node).action);

                if self.solver.find_tt_and_update_solver_status_pub(&env, &node_path) {
                    if self.solver.is_search_done() {
                        return node_path;
                    }
                    restart = true;
                    break;
                }
            }

            if restart {
                continue;
            }
        }
    }

    fn add_virtual_solved_node(&mut self, child: i32, parent: i32) {
        if !self.solver.config.use_virtual_solved {
            return;
        }
        self.solver.tree.get_mut(child).virtual_solved = true;
        if parent != NONE && self.solver.tree.get(child).player == self.solver.solved_player {
            self.solver.tree.get_mut(parent).virtual_solved = true;
        }
    }

    /// `Manager::beforeNNEvaluation` + `afterNNEvaluation` collapsed the
    /// same way `Solver::run_simulation` collapses them: select, evaluate,
    /// and either dispatch a job or expand and back up locally.
    fn run_simulation(&mut self, predictor: &dyn Predictor) {
        let node_path = self.selection();
        if self.is_search_done() {
            return;
        }

        if self.solver.config.use_critical_positions {
            self.recent_selection_path.add_selection_path(&self.solver.tree, &node_path);
        }

        self.solver.tree.add_virtual_loss(&node_path);

        let leaf = *node_path.last().unwrap();
        let leaf_env = self.solver.env_transition_of(&node_path);

        if let Some(winner) = self.solver.knowledge_handler.winner(&leaf_env, self.solver.solved_player) {
            self.solver.tree.remove_virtual_loss(&node_path, 1);
            let rzone = self.solver.rzone_handler.winner_rzone_of_leaf(&leaf_env);
            let mover = self.solver.tree.get(leaf).player;
            let status = if mover == winner { SolverStatus::Win } else { SolverStatus::Loss };
            self.solver.update_solver_status(status, node_path, rzone);
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

        let response = predictor.predict(&PredictRequest { hash_key: leaf_env.hash_key(), turn: leaf_env.turn(), features });

        let leaf_node = self.solver.tree.get(leaf);
        let leaf_player_is_solved_player = leaf_node.player == self.solver.solved_player;
        let should_dispatch = leaf_node.visit_count == 0
            && (!self.solver.config.manager_send_and_player_job || leaf_player_is_solved_player)
            && response.value < self.solver.config.manager_pcn_value_threshold;

        if should_dispatch {
            while !self.job_handler.has_idle_solvers() {
                self.handle_solver_job_results();
                thread::sleep(Duration::from_millis(50));
            }

            let parent = if node_path.len() >= 2 { node_path[node_path.len() - 2] } else { NONE };
            self.add_virtual_solved_node(leaf, parent);

            let sgf = self.get_solver_job_sgf(&node_path);
            let timeout = Duration::from_millis(self.solver.config.job_wait_timeout_ms);
            let solver_job = SolverJob::new(sgf, response.value);
            if let Err(err) = self.job_handler.add_job(leaf as u64, solver_job, Some(timeout)) {
                log::warn!("failed to dispatch leaf {} to a worker: {}", leaf, err);
            } else {
                log::debug!("dispatched leaf {} (pcn_value={:.3})", leaf, response.value);
            }
        } else {
            let legal_actions = leaf_env.legal_actions();
            let uniform = if legal_actions.is_empty() { 0.0 } else { 1.0 / legal_actions.len() as f32 };
            let priors: Vec<(gs_env::Action, f32)> = legal_actions
                .into_iter()
                .enumerate()
                .map(|(i, action)| (action, response.policy.get(i).copied().unwrap_or(uniform)))
                .collect();

            self.solver.tree.expand(leaf, leaf_env.turn(), &priors);
            let root_value = self.solver.proof_cost_value(&node_path, response.value);
            self.solver.tree.backup(&node_path, root_value);
            self.solver.tree.remove_virtual_loss(&node_path, 1);
        }
    }

    fn node_path_to(&self, leaf: i32) -> Vec<i32> {
        let mut path = vec![leaf];
        let mut current = leaf;
        while self.solver.tree.get(current).parent != NONE {
            current = self.solver.tree.get(current).parent;
            path.push(current);
        }
        path.reverse();
        path
    }

    /// `Manager::handleSolverJobResults`: drains completed jobs, reverses
    /// their virtual loss/solved bookkeeping, and either soft-backs-up an
    /// unsolved result or runs full solver-status + GHI propagation.
    pub fn handle_solver_job_results(&mut self) {
        let mut solved_sgf_message = String::new();

        for (owner, result) in self.job_handler.take_completed() {
            let leaf = owner as i32;
            let node_path = self.node_path_to(leaf);
            log::debug!("leaf {} returned {:?} after {} nodes", leaf, result.solver_status, result.nodes);

            let num_virtual_loss = self.solver.tree.get(leaf).virtual_loss;
            self.solver.tree.remove_virtual_loss(&node_path, num_virtual_loss);
            self.solver.tree.get_mut(leaf).virtual_solved = false;

            if self.solver.config.use_online_fine_tuning && self.solver.config.use_solved_positions && result.solver_status != SolverStatus::Unknown {
                solved_sgf_message.push(' ');
                solved_sgf_message.push_str(&self.get_solver_job_sgf(&node_path));
            }

            if node_path.iter().any(|&n| self.solver.tree.get(n).is_solved()) {
                continue;
            }

            if result.solver_status == SolverStatus::Unknown {
                let root_value = self.solver.proof_cost_value(&node_path, self.solver.config.manager_pcn_value_threshold);
                self.solver.tree.backup(&node_path, root_value);
                for &n in &node_path {
                    self.solver.tree.get_mut(n).virtual_solved = false;
                }
            } else {
                let leaf_player = self.solver.tree.get(leaf).player;
                let leaf_is_solved_player = leaf_player == self.solver.solved_player;
                let raw_value = if (!leaf_is_solved_player && result.solver_status == SolverStatus::Loss) || (leaf_is_solved_player && result.solver_status == SolverStatus::Win) {
                    0.0
                } else {
                    self.solver.config.nn_discrete_value_size as f32
                };

                let root_value = self.solver.proof_cost_value(&node_path, raw_value);
                self.solver.tree.backup(&node_path, root_value);
                self.solver.update_solver_status(result.solver_status, node_path.clone(), result.rzone_bitboard);
                self.update_ghi_data(&result.ghi_data, &node_path);
            }
        }

        if !solved_sgf_message.is_empty() {
            self.job_handler.output_async(&format!("solver solved_sgf{}", solved_sgf_message));
        }
    }

    fn handle_job_commands(&mut self) {
        while let Some(command) = self.job_handler.pop_command() {
            log::info!("received broadcast command: {}", command);
            if command == "quit" {
                self.quit = true;
            }
            // `load_model ...` is intentionally a no-op here: this
            // workspace's `Predictor` is supplied by the caller of
            // `step`, not hot-swapped from a broker command.
        }
    }

    /// `Manager::getSolverJobSgf`: the opening moves that led to the
    /// search root, followed by the actions along `node_path`.
    fn get_solver_job_sgf(&self, node_path: &[i32]) -> String {
        let mut moves = self.opening_moves.clone();
        for &index in &node_path[1..] {
            let node = self.solver.tree.get(index);
            moves.push((node.player, node.action));
        }

        let size = self.solver.config.board_size;
        format!("(;FF[4]CA[UTF-8]SZ[{}]{})", size, gs_env::sgf::encode(&moves, size))
    }

    /// `Manager::updateGHIData`: `ghi_data` is `"<min_loop_offset>"` (this
    /// workspace does not maintain a separate GHI pattern store the way
    /// `GHIData::patterns_` does -- `GhiData::patterns` in `gs_mcts`
    /// already derives those from `rzone_data_index` on demand, see
    /// `Solver::collect_ghi_info`).
    fn update_ghi_data(&mut self, ghi_data: &str, node_path: &[i32]) {
        if ghi_data.is_empty() {
            return;
        }

        let min_loop_offset: i32 = ghi_data.trim().parse().unwrap_or(0);
        for &n in node_path {
            self.solver.tree.get_mut(n).ghi = true;
        }

        let start_loop_index = (node_path.len() as i32 + min_loop_offset).max(0) as usize;
        for &n in &node_path[start_loop_index.min(node_path.len())..] {
            self.solver.tree.get_mut(n).in_loop = true;
        }
    }

    /// `Manager::broadcastCriticalPositions`: once the trie has collected
    /// `manager_critical_positions_n` selections, emit every branch that
    /// cleared `n * m / n` and is still unsolved, then reset the trie.
    fn broadcast_critical_positions(&mut self) {
        if !self.solver.config.use_online_fine_tuning || !self.solver.config.use_critical_positions {
            return;
        }
        if self.recent_selection_path.root_count() < self.solver.config.manager_critical_positions_n {
            return;
        }

        let openings = self.recent_selection_path.summarize(
            &self.solver.tree,
            self.solver.config.board_size,
            self.solver.config.manager_critical_positions_m,
            self.solver.config.manager_critical_positions_n,
        );

        if !openings.is_empty() {
            let joined: String = openings.into_iter().map(|o| format!(" {}", o)).collect();
            self.job_handler.output_async(&format!("solver openings{}", joined));
        }
        self.recent_selection_path.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_env::hex::HexEnvironment;
    use gs_mcts::knowledge::HexKnowledgeHandler;
    use gs_mcts::rzone::HexRZoneHandler;

    fn new_manager() -> Manager<HexEnvironment, HexRZoneHandler, HexKnowledgeHandler> {
        let env = HexEnvironment::new(3);
        let solver = Solver::new(env, HexRZoneHandler, HexKnowledgeHandler, Config::new(), Player::Black);
        let job_handler = JobHandler::new("manager-test", "broker");
        Manager::new(solver, job_handler, Vec::new())
    }

    #[test]
    fn step_expands_root_when_predictor_reports_a_tractable_value() {
        let mut manager = new_manager();
        manager.solver.config.manager_pcn_value_threshold = -2.0; // never dispatch

        manager.step(&gs_nn::predictor::UniformPredictor);

        assert!(!manager.solver.tree.get(manager.solver.tree.root()).is_leaf());
    }

    #[test]
    fn step_solves_a_trivial_one_cell_board_without_dispatch() {
        let env = HexEnvironment::new(1);
        let solver = Solver::new(env, HexRZoneHandler, HexKnowledgeHandler, Config::new(), Player::Black);
        let job_handler = JobHandler::new("manager-test", "broker");
        let mut manager = Manager::new(solver, job_handler, Vec::new());
        manager.solver.config.manager_pcn_value_threshold = -2.0;

        for _ in 0..4 {
            if manager.is_search_done() {
                break;
            }
            manager.step(&gs_nn::predictor::UniformPredictor);
        }

        assert!(manager.solver.tree.get(manager.solver.tree.root()).is_solved());
    }

    #[test]
    fn get_solver_job_sgf_includes_opening_and_node_path_moves() {
        let env = HexEnvironment::new(3);
        let solver = Solver::new(env, HexRZoneHandler, HexKnowledgeHandler, Config::new(), Player::Black);
        let job_handler = JobHandler::new("manager-test", "broker");
        let mut manager = Manager::new(solver, job_handler, vec![(Player::Black, gs_env::Action::Play(0))]);
        manager.solver.tree.expand(0, Player::Black, &[(gs_env::Action::Play(1), 1.0)]);
        let child = manager.solver.tree.get(0).children[0];

        let sgf = manager.get_solver_job_sgf(&[0, child]);
        assert!(sgf.starts_with("(;FF[4]CA[UTF-8]SZ[3]"));
        assert!(sgf.contains(";B["));
        assert!(sgf.ends_with(')'));
    }

    #[test]
    fn handle_job_commands_sets_quit_flag() {
        let mut manager = new_manager();
        manager.job_handler.push_command("quit");

        manager.handle_job_commands();
        assert!(manager.is_search_done());
    }
}
