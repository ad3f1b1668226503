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

//! The payload carried inside a broker `Job`'s command/output strings: a
//! position to solve (as an SGF-ish move sequence) going out, and a
//! solver status plus its proving R-zone coming back.

use gs_core::bitboard::Bitboard;
use gs_mcts::SolverStatus;

use super::broker_adapter::JobId;

/// A position handed to a worker to solve, and (once filled in) the
/// result of solving it. Grounded in `solver_job.cpp`'s `setJob`/
/// `getJobString`/`setJobResult`/`getJobResultString` wire format, with
/// the SGF tag soup traded for this workspace's minimal move-sequence
/// codec (`gs_env::sgf`).
#[derive(Debug, Clone)]
pub struct SolverJob {
    pub job_id: Option<JobId>,
    pub sgf: String,
    pub pcn_value: f32,
    pub solver_status: SolverStatus,
    pub rzone_bitboard: Bitboard,
    pub nodes: u32,
    pub ghi_data: String,
}

impl SolverJob {
    pub fn new(sgf: String, pcn_value: f32) -> Self {
        Self {
            job_id: None,
            sgf,
            pcn_value,
            solver_status: SolverStatus::Unknown,
            rzone_bitboard: Bitboard::new(),
            nodes: 0,
            ghi_data: String::new(),
        }
    }

    /// Parses `job_id sgf [pcn_value]` as sent by a manager's `request`.
    pub fn set_job(&mut self, job_string: &str) -> bool {
        let args: Vec<&str> = job_string.split_whitespace().collect();
        if args.len() < 2 {
            return false;
        }

        let job_id: JobId = match args[0].parse() {
            Ok(id) => id,
            Err(_) => return false,
        };

        *self = SolverJob::new(args[1].to_string(), 0.0);
        self.job_id = Some(job_id);
        if let Some(pcn) = args.get(2) {
            self.pcn_value = pcn.parse().unwrap_or(0.0);
        }
        true
    }

    /// Parses `solver_status rzone_hex nodes "ghi_data"` as returned by a
    /// worker's `response`.
    pub fn set_job_result(&mut self, result_string: &str) -> bool {
        let args: Vec<&str> = result_string.splitn(4, ' ').collect();
        if args.len() < 3 {
            return false;
        }

        let status = match args[0] {
            "0" => SolverStatus::Unknown,
            "1" => SolverStatus::Win,
            "2" => SolverStatus::Loss,
            _ => return false,
        };
        let rzone = match Bitboard::from_hex(args[1]) {
            Ok(bitboard) => bitboard,
            Err(_) => return false,
        };
        let nodes: u32 = match args[2].parse() {
            Ok(nodes) => nodes,
            Err(_) => return false,
        };

        self.solver_status = status;
        self.rzone_bitboard = rzone;
        self.nodes = nodes;
        self.ghi_data = args.get(3).map(|s| s.trim_matches('"').to_string()).unwrap_or_default();
        true
    }

    pub fn job_string(&self, with_job_id: bool) -> String {
        let mut out = String::new();
        if with_job_id {
            out.push_str(&self.job_id.map(|id| id.to_string()).unwrap_or_default());
            out.push(' ');
        }
        out.push_str(&self.sgf);
        out.push(' ');
        out.push_str(&self.pcn_value.to_string());
        out
    }

    pub fn job_result_string(&self, with_job_id: bool) -> String {
        let status = match self.solver_status {
            SolverStatus::Unknown => 0,
            SolverStatus::Win => 1,
            SolverStatus::Loss => 2,
        };

        let mut out = String::new();
        if with_job_id {
            out.push_str(&self.job_id.map(|id| id.to_string()).unwrap_or_default());
            out.push(' ');
        }
        out.push_str(&format!("{} {} {} \"{}\"", status, self.rzone_bitboard.to_hex(), self.nodes, self.ghi_data));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_string_round_trips_through_set_job() {
        let mut job = SolverJob::new(";B[ab]".to_string(), 0.5);
        job.job_id = Some(7);
        let wire = job.job_string(true);

        let mut parsed = SolverJob::new(String::new(), 0.0);
        assert!(parsed.set_job(&wire));
        assert_eq!(parsed.job_id, Some(7));
        assert_eq!(parsed.sgf, ";B[ab]");
        assert_eq!(parsed.pcn_value, 0.5);
    }

    #[test]
    fn job_result_round_trips_bitboard_and_status() {
        let mut job = SolverJob::new(";B[ab]".to_string(), 0.0);
        job.solver_status = SolverStatus::Win;
        job.rzone_bitboard.set(3);
        job.nodes = 42;
        job.ghi_data = "none".to_string();

        let wire = job.job_result_string(false);

        let mut parsed = SolverJob::new(String::new(), 0.0);
        assert!(parsed.set_job_result(&wire));
        assert_eq!(parsed.solver_status, SolverStatus::Win);
        assert!(parsed.rzone_bitboard.test(3));
        assert_eq!(parsed.nodes, 42);
        assert_eq!(parsed.ghi_data, "none");
    }

    #[test]
    fn rejects_malformed_job_string() {
        let mut job = SolverJob::new(String::new(), 0.0);
        assert!(!job.set_job("only-one-field"));
    }
}
