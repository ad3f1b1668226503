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

//! A fresh 7x7 Hex root is nowhere near a terminal position, so a single
//! rollout just expands the root and backs up the predictor's value --
//! the solver status must stay `Unknown` and no R-zone has been recorded.

extern crate gs_core;
extern crate gs_env;
extern crate gs_mcts;
extern crate gs_nn;

use gs_core::config::Config;
use gs_env::hex::HexEnvironment;
use gs_env::Player;
use gs_mcts::knowledge::HexKnowledgeHandler;
use gs_mcts::rzone::HexRZoneHandler;
use gs_mcts::{Solver, SolverStatus};
use gs_nn::predictor::UniformPredictor;

#[test]
fn one_rollout_on_an_empty_board_leaves_the_root_unsolved() {
    let env = HexEnvironment::new(7);
    let mut solver = Solver::new(env, HexRZoneHandler, HexKnowledgeHandler, Config::new(), Player::Black);

    solver.run_simulation(&UniformPredictor);

    let root = solver.tree.root();
    assert_eq!(solver.tree.get(root).solver_status, SolverStatus::Unknown);
    assert!(!solver.tree.get(root).is_leaf());
    assert_eq!(solver.tree.get(root).rzone_data_index, -1);
    assert!(solver.tree.len() > 1);
    assert_eq!(solver.tree.get(root).visit_count, 1);
}
