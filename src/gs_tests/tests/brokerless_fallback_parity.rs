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

//! A manager never has to reach its broker for a leaf that is already
//! terminal -- `Manager::step`'s dispatch branch only runs once a
//! zero-visit leaf survives the same `knowledge_handler.winner` check a
//! brokerless worker applies directly through `Solver::run_simulation`.
//! This confirms both paths land on the identical verdict for the same
//! position, without a `JobHandler` ever being connected to anything.

extern crate gs_broker;
extern crate gs_core;
extern crate gs_env;
extern crate gs_manager;
extern crate gs_mcts;
extern crate gs_nn;

use gs_core::config::Config;
use gs_env::killallgo::KillAllGoEnvironment;
use gs_env::{Action, Environment, Player};
use gs_manager::Manager;
use gs_mcts::knowledge::KillAllGoKnowledgeHandler;
use gs_mcts::rzone::KillAllGoRZoneHandler;
use gs_mcts::{Solver, SolverStatus};
use gs_nn::predictor::UniformPredictor;

/// A ring of White stones enclosing two single-point eyes -- the same
/// Benson-alive shape `killallgo.rs`'s own unit tests build directly on
/// private fields, replayed here through legal plays since a double pass
/// alone no longer proves a win.
fn white_unconditionally_alive() -> KillAllGoEnvironment {
    let mut env = KillAllGoEnvironment::new(5);
    for &pos in &[1, 5, 6, 7, 8, 9, 14, 19, 18, 23] {
        env.apply(Action::Pass); // black
        env.apply(Action::Play(pos)); // white
    }
    env.apply(Action::Pass); // black, leaves it white's turn

    env
}

#[test]
fn manager_reaches_the_same_verdict_as_a_direct_solver_without_a_broker() {
    let direct = {
        let env = white_unconditionally_alive();
        let mut solver = Solver::new(env, KillAllGoRZoneHandler, KillAllGoKnowledgeHandler, Config::new(), Player::White);
        solver.run_simulation(&UniformPredictor);
        solver.tree.get(solver.tree.root()).solver_status
    };

    let via_manager = {
        let env = white_unconditionally_alive();
        let solver = Solver::new(env, KillAllGoRZoneHandler, KillAllGoKnowledgeHandler, Config::new(), Player::White);
        let job_handler = gs_broker::JobHandler::new("parity-test", "broker");
        let mut manager = Manager::new(solver, job_handler, Vec::new());

        manager.step(&UniformPredictor);
        manager.solver.tree.get(manager.solver.tree.root()).solver_status
    };

    assert_eq!(direct, SolverStatus::Win);
    assert_eq!(direct, via_manager);
}
