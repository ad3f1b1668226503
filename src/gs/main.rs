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

//! Process entry point: reads a handful of command-line flags into a
//! `Config` and dispatches to a manager or a worker, mirroring
//! `GSModeHandler::runManager`/`runWorker`'s `--mode` switch. The
//! interactive console and self-play/training modes (`runConsole`,
//! `runSelfPlay`, `runZeroServer`) stay out of scope.

extern crate env_logger;
extern crate gs_broker;
extern crate gs_core;
extern crate gs_env;
extern crate gs_manager;
extern crate gs_mcts;
extern crate gs_nn;
extern crate log;

mod worker;

use gs_core::config::Config;
use gs_env::{Environment, Player};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Game {
    Hex,
    KillAllGo,
}

struct Args {
    mode: String,
    game: Game,
    config: Config,
    solved_player: Player,
    name: String,
    opening: String,
}

fn parse_args() -> Args {
    let mut mode = "worker".to_string();
    let mut game = Game::Hex;
    let mut config = Config::new();
    let mut solved_player = Player::Black;
    let mut name = "gs".to_string();
    let mut opening = String::new();

    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        let mut next = || args.next().unwrap_or_default();
        match flag.as_str() {
            "--mode" => mode = next(),
            "--game" => game = if next() == "killall-go" { Game::KillAllGo } else { Game::Hex },
            "--board-size" => config.board_size = next().parse().unwrap_or(config.board_size),
            "--num-rollouts" => config.num_rollouts = next().parse().unwrap_or(config.num_rollouts),
            "--solved-player" => solved_player = if next() == "white" { Player::White } else { Player::Black },
            "--broker-address" => config.broker_address = next(),
            "--broker-port" => config.broker_port = next().parse().unwrap_or(config.broker_port),
            "--name" => name = next(),
            "--opening" => opening = next(),
            _ => {}
        }
    }

    Args { mode, game, config, solved_player, name, opening }
}

fn main() {
    env_logger::init();
    let args = parse_args();

    if let Err(err) = args.config.validate() {
        log::error!("invalid configuration: {}", err);
        std::process::exit(1);
    }

    match args.mode.as_str() {
        "worker" => worker::run(&args.config, args.game, &args.name),
        "manager" => run_manager(&args),
        other => {
            log::error!("unrecognized --mode '{}', expected 'worker' or 'manager'", other);
            std::process::exit(1);
        }
    }
}

fn run_manager(args: &Args) {
    let opening_moves = if args.opening.is_empty() {
        Vec::new()
    } else {
        gs_env::sgf::decode(&args.opening, args.config.board_size).unwrap_or_else(|err| {
            log::error!("could not parse --opening: {}", err);
            std::process::exit(1);
        })
    };

    match args.game {
        Game::Hex => {
            let mut root_env = gs_env::hex::HexEnvironment::new(args.config.board_size);
            for &(_, action) in &opening_moves {
                root_env.apply(action);
            }
            run_manager_for(args, root_env, opening_moves, gs_mcts::rzone::HexRZoneHandler, gs_mcts::knowledge::HexKnowledgeHandler)
        }
        Game::KillAllGo => {
            let mut root_env = gs_env::killallgo::KillAllGoEnvironment::new(args.config.board_size);
            for &(_, action) in &opening_moves {
                root_env.apply(action);
            }
            run_manager_for(
                args,
                root_env,
                opening_moves,
                gs_mcts::rzone::KillAllGoRZoneHandler,
                gs_mcts::knowledge::KillAllGoKnowledgeHandler,
            )
        }
    }
}

fn run_manager_for<E, R, K>(args: &Args, root_env: E, opening_moves: Vec<(Player, gs_env::Action)>, rzone_handler: R, knowledge_handler: K)
where
    E: gs_env::Environment,
    R: gs_mcts::rzone::RZoneHandler<E>,
    K: gs_mcts::knowledge::KnowledgeHandler<E>,
{
    let solver = gs_mcts::Solver::new(root_env, rzone_handler, knowledge_handler, args.config.clone(), args.solved_player);
    let job_handler = gs_broker::JobHandler::new(args.name.clone(), "broker");
    if let Err(err) = job_handler.connect(&args.config.broker_address, args.config.broker_port) {
        log::error!("could not connect to broker: {}", err);
        std::process::exit(1);
    }

    let mut manager = gs_manager::Manager::new(solver, job_handler, opening_moves);
    let predictor = gs_nn::predictor::UniformPredictor;

    log::info!("manager '{}' solving for {:?}", args.name, args.solved_player);
    while !manager.is_search_done() {
        manager.step(&predictor);
    }

    let root = manager.solver.tree.root();
    log::info!("search done: {:?}", manager.solver.tree.get(root).solver_status);
}
