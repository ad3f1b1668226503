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

//! Solves jobs the broker hands out one at a time, grounded in
//! `solver_group.cpp`'s `SolverGroup`/`SolverSlaveThread` -- simplified
//! to a single-threaded pull loop, since this workspace's `Solver` has
//! no asynchronous NN batching boundary to parallelize slaves around.
//! A job is assigned with `+<id> <sgf> <pcn>` and cancelled with
//! `-<id>`, the same grammar `solver_group.cpp` feeds its slave threads;
//! the result is reported back as `response <id> 0 {<result>}`, the
//! wire shape `job_handler.rs`/`broker_adapter.rs` already parse on the
//! manager side of the same connection.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gs_broker::{BrokerAdapter, BrokerCallbacks};
use gs_core::bitboard::Bitboard;
use gs_core::config::Config;
use gs_core::error::GsError;
use gs_env::{Action, Environment, Player};
use gs_mcts::{GhiData, Solver};
use gs_nn::predictor::UniformPredictor;

use crate::Game;

fn parse_assign(message: &str) -> Option<(u64, String, f32)> {
    let rest = message.strip_prefix('+')?;
    let (id_str, rest) = rest.split_once(' ')?;
    let id: u64 = id_str.parse().ok()?;
    let (sgf, pcn_str) = rest.rsplit_once(' ')?;
    let pcn = pcn_str.parse().ok()?;
    Some((id, sgf.to_string(), pcn))
}

fn parse_cancel(message: &str) -> Option<u64> {
    message.strip_prefix('-')?.trim().parse().ok()
}

fn parse_job_sgf(sgf: &str) -> Result<(usize, Vec<(Player, Action)>), GsError> {
    let inner = sgf
        .strip_prefix("(;FF[4]CA[UTF-8]SZ[")
        .ok_or_else(|| GsError::InvalidJob(format!("missing SZ header in '{}'", sgf)))?;
    let (size_str, rest) = inner
        .split_once(']')
        .ok_or_else(|| GsError::InvalidJob(format!("malformed SZ header in '{}'", sgf)))?;
    let size: usize = size_str
        .parse()
        .map_err(|_| GsError::InvalidJob(format!("bad board size in '{}'", sgf)))?;
    let moves_str = rest.strip_suffix(')').unwrap_or(rest);

    Ok((size, gs_env::sgf::decode(moves_str, size)?))
}

/// The two concrete environments have an inherent `new(size)` but no
/// shared trait method for it (`Environment` only describes in-game
/// behavior) -- this bridges that gap for the worker's generic job loop.
trait BuildFromMoves {
    fn new_with_size(size: usize) -> Self;
}

impl BuildFromMoves for gs_env::hex::HexEnvironment {
    fn new_with_size(size: usize) -> Self {
        Self::new(size)
    }
}

impl BuildFromMoves for gs_env::killallgo::KillAllGoEnvironment {
    fn new_with_size(size: usize) -> Self {
        Self::new(size)
    }
}

struct WorkerRouter {
    inbox: Arc<Mutex<VecDeque<(u64, String, f32)>>>,
    cancelled: Arc<Mutex<HashSet<u64>>>,
    quit: Arc<AtomicBool>,
}

impl BrokerCallbacks for WorkerRouter {
    fn on_network_error(&self, msg: &str) {
        log::warn!("broker connection error: {}", msg);
    }

    fn handle_extended_message(&self, message: &str, _sender: &str) -> bool {
        if message == "quit" {
            self.quit.store(true, Ordering::Release);
            return true;
        }
        if let Some((id, sgf, pcn)) = parse_assign(message) {
            self.inbox.lock().expect("could not acquire lock").push_back((id, sgf, pcn));
            return true;
        }
        if let Some(id) = parse_cancel(message) {
            self.cancelled.lock().expect("could not acquire lock").insert(id);
            return true;
        }
        false
    }
}

fn solve_one<E, R, K>(solver: &mut Solver<E, R, K>)
where
    E: Environment,
    R: gs_mcts::rzone::RZoneHandler<E>,
    K: gs_mcts::knowledge::KnowledgeHandler<E>,
{
    let predictor = UniformPredictor;
    while !solver.is_search_done() {
        solver.run_simulation(&predictor);
    }
}

fn build_result<E, R, K>(solver: &Solver<E, R, K>, pcn_value: f32) -> gs_broker::SolverJob
where
    E: Environment,
    R: gs_mcts::rzone::RZoneHandler<E>,
    K: gs_mcts::knowledge::KnowledgeHandler<E>,
{
    let root = solver.tree.root();
    let root_node = solver.tree.get(root);

    let mut result = gs_broker::SolverJob::new(String::new(), pcn_value);
    result.solver_status = root_node.solver_status;
    result.nodes = solver.tree.len() as u32;
    result.rzone_bitboard = if root_node.rzone_data_index >= 0 {
        solver.rzone_data.get(root_node.rzone_data_index).rzone()
    } else {
        Bitboard::new()
    };

    let mut ghi_data = GhiData::default();
    solver.collect_ghi_info(root, &mut ghi_data);
    result.ghi_data = ghi_data.min_loop_offset_before_root.to_string();

    result
}

fn handle_job<E, R, K>(config: &Config, solved_player: Player, rzone_handler: R, knowledge_handler: K, sgf: &str, pcn_value: f32) -> Result<gs_broker::SolverJob, GsError>
where
    E: Environment + BuildFromMoves,
    R: gs_mcts::rzone::RZoneHandler<E>,
    K: gs_mcts::knowledge::KnowledgeHandler<E>,
{
    let (size, moves) = parse_job_sgf(sgf)?;
    let mut env = E::new_with_size(size);
    for &(_, action) in &moves {
        env.apply(action);
    }

    let mut solver = Solver::new(env, rzone_handler, knowledge_handler, config.clone(), solved_player);
    solve_one(&mut solver);
    Ok(build_result(&solver, pcn_value))
}

pub fn run(config: &Config, game: Game, name: &str) {
    let inbox = Arc::new(Mutex::new(VecDeque::new()));
    let cancelled = Arc::new(Mutex::new(HashSet::new()));
    let quit = Arc::new(AtomicBool::new(false));
    let router = WorkerRouter { inbox: Arc::clone(&inbox), cancelled: Arc::clone(&cancelled), quit: Arc::clone(&quit) };
    let adapter = BrokerAdapter::new(name.to_string(), "broker", router);

    if let Err(err) = adapter.connect(&config.broker_address, config.broker_port) {
        log::error!("could not connect to broker: {}", err);
        std::process::exit(1);
    }

    log::info!("worker '{}' ready for {:?}", name, game);
    loop {
        if quit.load(Ordering::Acquire) {
            break;
        }

        let job = inbox.lock().expect("could not acquire lock").pop_front();
        let (id, sgf, pcn) = match job {
            Some(job) => job,
            None => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
        };

        if cancelled.lock().expect("could not acquire lock").remove(&id) {
            log::debug!("job {} cancelled before it started", id);
            continue;
        }

        let result = match game {
            Game::Hex => handle_job::<gs_env::hex::HexEnvironment, _, _>(
                config,
                Player::Black,
                gs_mcts::rzone::HexRZoneHandler,
                gs_mcts::knowledge::HexKnowledgeHandler,
                &sgf,
                pcn,
            ),
            Game::KillAllGo => handle_job::<gs_env::killallgo::KillAllGoEnvironment, _, _>(
                config,
                Player::Black,
                gs_mcts::rzone::KillAllGoRZoneHandler,
                gs_mcts::knowledge::KillAllGoKnowledgeHandler,
                &sgf,
                pcn,
            ),
        };

        match result {
            Ok(result) => {
                log::debug!("job {} solved: {:?}", id, result.solver_status);
                adapter.output_async_pub(&format!("response {} 0 {{{}}}", id, result.job_result_string(false)));
            }
            Err(err) => {
                log::warn!("job {} rejected: {}", id, err);
                adapter.output_async_pub(&format!("response {} -1 {{{}}}", id, err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_assign_message() {
        let parsed = parse_assign("+7 (;FF[4]CA[UTF-8]SZ[3];B[ab]) 0.25").unwrap();
        assert_eq!(parsed.0, 7);
        assert_eq!(parsed.1, "(;FF[4]CA[UTF-8]SZ[3];B[ab])");
        assert_eq!(parsed.2, 0.25);
    }

    #[test]
    fn parses_a_cancel_message() {
        assert_eq!(parse_cancel("-7"), Some(7));
        assert_eq!(parse_cancel("+7 x 0.0"), None);
    }

    #[test]
    fn router_queues_assigned_jobs_and_ignores_unrelated_chatter() {
        let inbox = Arc::new(Mutex::new(VecDeque::new()));
        let cancelled = Arc::new(Mutex::new(HashSet::new()));
        let quit = Arc::new(AtomicBool::new(false));
        let router = WorkerRouter { inbox: Arc::clone(&inbox), cancelled: Arc::clone(&cancelled), quit: Arc::clone(&quit) };

        assert!(!router.handle_extended_message("unrelated chatter", "broker"));
        assert!(router.handle_extended_message("+3 (;FF[4]CA[UTF-8]SZ[3];B[ab]) 0.1", "broker"));
        assert_eq!(inbox.lock().unwrap().len(), 1);

        assert!(router.handle_extended_message("-3", "broker"));
        assert!(cancelled.lock().unwrap().contains(&3));

        assert!(router.handle_extended_message("quit", "broker"));
        assert!(quit.load(Ordering::Acquire));
    }

    #[test]
    fn parses_job_sgf_back_into_board_size_and_moves() {
        let (size, moves) = parse_job_sgf("(;FF[4]CA[UTF-8]SZ[5];B[cc];W[dd])").unwrap();
        assert_eq!(size, 5);
        assert_eq!(moves.len(), 2);
    }

    #[test]
    fn rejects_a_job_sgf_missing_its_size_header() {
        assert!(parse_job_sgf(";B[ab]").is_err());
    }
}
