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

use gs_core::hashkey::HashKey;
use gs_env::Player;

/// A single leaf awaiting evaluation. Carries the information a batcher
/// needs to route the matching `PredictResponse` back to the right tree
/// node without re-deriving it from the board.
#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub hash_key: HashKey,
    pub turn: Player,
    /// Flattened one-hot-per-position occupancy features, `2 * num_positions`
    /// long (own stones, then opponent stones), mirroring the teacher's
    /// `CHW`-ordered feature planes without any of the historical/liberty
    /// planes the real network also consumes -- those live entirely behind
    /// `Predictor` and are not this workspace's concern.
    pub features: Vec<f32>,
}

/// Policy + value output for one `PredictRequest`.
#[derive(Debug, Clone)]
pub struct PredictResponse {
    /// Move probabilities, indexed by board position, plus one trailing
    /// "pass" slot.
    pub policy: Vec<f32>,
    /// Value estimate in `[-1, 1]` from the perspective of the player to
    /// move in the evaluated position.
    pub value: f32,
}

/// Black-box policy/value oracle. Implementations may batch internally;
/// `gs_mcts` calls `predict` once per leaf and lets the implementation
/// decide how to group requests for throughput, the same division of
/// responsibility as the teacher's `dg_nn::Network`/`dg_mcts` boundary.
pub trait Predictor: Send + Sync {
    fn predict(&self, request: &PredictRequest) -> PredictResponse;
}

/// A predictor that returns a uniform policy and a zero value, useful for
/// exercising search plumbing without a trained network -- the Rust
/// analogue of the teacher's own `RandomPredictor`/`NanPredictor` test
/// doubles.
pub struct UniformPredictor;

impl Predictor for UniformPredictor {
    fn predict(&self, request: &PredictRequest) -> PredictResponse {
        let num_slots = request.features.len() / 2 + 1;
        let uniform = 1.0 / num_slots as f32;

        PredictResponse {
            policy: vec![uniform; num_slots],
            value: 0.0,
        }
    }
}

/// A predictor that always reports a won position for the side to move,
/// used to exercise the solver-status backup path in isolation from any
/// particular game's rules.
pub struct AlwaysWinsPredictor;

impl Predictor for AlwaysWinsPredictor {
    fn predict(&self, request: &PredictRequest) -> PredictResponse {
        let num_slots = request.features.len() / 2 + 1;

        PredictResponse {
            policy: vec![1.0 / num_slots as f32; num_slots],
            value: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> PredictRequest {
        PredictRequest {
            hash_key: 42,
            turn: Player::Black,
            features: vec![0.0; 18],
        }
    }

    #[test]
    fn uniform_predictor_sums_to_roughly_one() {
        let response = UniformPredictor.predict(&sample_request());
        let sum: f32 = response.policy.iter().sum();

        assert!((sum - 1.0).abs() < 1e-4);
        assert_eq!(response.value, 0.0);
    }

    #[test]
    fn always_wins_predictor_reports_max_value() {
        let response = AlwaysWinsPredictor.predict(&sample_request());
        assert_eq!(response.value, 1.0);
    }
}
