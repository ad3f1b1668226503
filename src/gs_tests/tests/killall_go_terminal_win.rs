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

//! A root handed to the solver already unconditionally alive for White
//! is won the instant the first simulation runs: no expansion happens at
//! all, the root's own leaf check resolves the game.

extern crate gs_core;
extern crate gs_env;
extern crate gs_mcts;
extern crate gs_nn;

use gs_core::config::Config;
use gs_env::killallgo::KillAllGoEnvironment;
use gs_env::{Action, Environment, Player};
use gs_mcts::knowledge::KillAllGoKnowledgeHandler;
use gs_mcts::rzone::KillAllGoRZoneHandler;
use gs_mcts::{Solver, SolverStatus};
use gs_nn::predictor::UniformPredictor;

const BENSON_ALIVE_RING: [usize; 10] = [1, 5, 6, 7, 8, 9, 14, 19, 18, 23];

/// A ring of White stones enclosing two single-point eyes -- the same
/// Benson-alive shape `killallgo.rs`'s own unit tests build directly on
/// private fields, replayed here through legal plays since a double pass
/// alone no longer proves a win.
fn white_unconditionally_alive() -> KillAllGoEnvironment {
    let mut env = KillAllGoEnvironment::new(5);
    for &pos in &BENSON_ALIVE_RING {
        env.apply(Action::Pass); // black
        env.apply(Action::Play(pos)); // white
    }
    env.apply(Action::Pass); // black, leaves it white's turn

    env
}

#[test]
fn root_is_solved_win_on_the_very_first_simulation() {
    let env = white_unconditionally_alive();
    assert_eq!(env.winner(), Some(Player::White));
    assert_eq!(env.turn(), Player::White);

    let mut solver = Solver::new(env, KillAllGoRZoneHandler, KillAllGoKnowledgeHandler, Config::new(), Player::White);

    solver.run_simulation(&UniformPredictor);

    let root = solver.tree.root();
    assert_eq!(solver.tree.get(root).solver_status, SolverStatus::Win);
    assert_eq!(solver.tree.len(), 1);
    assert!(solver.tree.get(root).is_leaf());

    let rzone_index = solver.tree.get(root).rzone_data_index;
    assert_ne!(rzone_index, -1);
    let rzone = solver.rzone_data.get(rzone_index).rzone();
    for &pos in &BENSON_ALIVE_RING {
        assert!(rzone.test(pos));
    }
    assert!(!rzone.test(0));
    assert!(!rzone.test(24));
}
