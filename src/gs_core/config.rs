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

/// Immutable run-time configuration, built once and passed by reference
/// through the search, manager and broker layers.
///
/// Replaces the original's global mutable `gamesolver::*` namespace
/// (`gs_configuration.h`) with a plain value per the composition-over-
/// globals guidance in spec §9 -- nothing in this workspace reaches for a
/// `lazy_static!` tunable the way `dg_utils::config` does.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // -- search --
    /// Number of rollouts per move before a decision is made.
    pub num_rollouts: u32,
    /// PUCT exploration constant.
    pub puct_constant: f32,
    /// Number of threads used to drive simulations.
    pub num_search_threads: usize,
    /// Maximum number of leaf requests batched into one NN forward pass.
    pub batch_size: usize,

    // -- R-zone / R-zone TT --
    /// Whether R-zone pruning (winner/loser R-zone propagation and the
    /// block/grid TT it feeds) runs at all. Off falls back to plain
    /// AND/OR solver-status propagation with no zone bookkeeping.
    pub use_rzone: bool,
    /// Whether a solved node's R-zone pattern is looked up/stored in the
    /// block-TT. Mutually exclusive with `use_grid_tt`.
    pub use_block_tt: bool,
    /// Whether the grid-TT is used instead of the block-TT. Mutually
    /// exclusive with `use_block_tt`. The original's grid-TT store/lookup
    /// is itself dead code (`rzone_tt_handler.cpp` leaves both bodies
    /// commented out behind a standing TODO), so setting this is
    /// faithfully a no-op: nothing is ever stored and every lookup misses.
    pub use_grid_tt: bool,
    /// Whether a cached TT hit is rejected when GHI bookkeeping shows the
    /// cached result's loop may not recur identically this time.
    pub use_ghi_check: bool,
    /// `bit_size` passed to the block-TT's `OpenAddressHashTable`.
    pub rzone_tt_block_bits: u32,
    /// `bit_size` passed to the grid-TT's `OpenAddressHashTable`. The
    /// grid-TT itself never stores or hits (see `tt.rs`), so this only
    /// sizes an always-empty table.
    pub rzone_tt_grid_bits: u32,
    /// Whether to collect `StopTimer`-style hit/miss statistics on the
    /// R-zone TT. Off by default since it adds overhead to every lookup.
    pub use_timer_in_tt: bool,

    // -- manager --
    /// NN value below which a zero-visit leaf on the solved player's turn
    /// is dispatched to a worker instead of expanded locally; also the
    /// backup value used when a dispatched job comes back `Unknown`.
    pub manager_pcn_value_threshold: f32,
    /// Width of the random top-K PUCT selection the manager uses at
    /// opponent-turn nodes once their visit count reaches K, to broaden
    /// the tree instead of always diving into the single best line.
    pub manager_top_k_selection: usize,
    /// Whether the manager marks dispatched leaves (and, for solved-player
    /// moves, their parent) virtual-solved so selection skips them.
    pub use_virtual_solved: bool,
    /// Whether job dispatch is restricted to leaves whose move belongs to
    /// the solved player (vs. either player).
    pub manager_send_and_player_job: bool,
    /// Whether the manager is allowed to back up through already-solved
    /// descendants at all.
    pub use_solved_positions: bool,
    /// Whether the manager folds completed worker jobs back into its own
    /// R-zone TT and GHI bookkeeping rather than discarding them.
    pub use_online_fine_tuning: bool,
    /// Whether the manager broadcasts critical positions (selection
    /// paths selected often enough to clear the N·M/N threshold) to
    /// workers.
    pub use_critical_positions: bool,
    /// Number of recent selection paths collected before the trie is
    /// summarized and reset.
    pub manager_critical_positions_n: u32,
    /// Numerator (over `manager_critical_positions_n`) a branch's count
    /// must reach to be considered critical enough to broadcast.
    pub manager_critical_positions_m: u32,

    // -- broker --
    /// Hostname or address of the broker to connect to.
    pub broker_address: String,
    /// Port of the broker to connect to.
    pub broker_port: u16,
    /// Maximum number of outstanding (unconfirmed + accepted) jobs a
    /// manager keeps in flight at once.
    pub max_outstanding_jobs: usize,
    /// How long `BrokerAdapter::wait_job_until` waits for a state change
    /// before giving up, in milliseconds.
    pub job_wait_timeout_ms: u64,

    // -- environment --
    /// Board size (7 for 7x7 Killall-Go and the Hex sizes this workspace
    /// targets).
    pub board_size: usize,

    // -- proof-cost backup --
    /// Number of discrete bins the network's value head is trained
    /// against; backed-up proof-cost values are clamped to
    /// `[0, nn_discrete_value_size - 1]`, matching `config::nn_discrete_value_size`.
    pub nn_discrete_value_size: u32,
}

impl Config {
    /// Defaults mirroring `gs_configuration.cpp`'s initializers.
    pub fn new() -> Self {
        Self {
            num_rollouts: 1_600,
            puct_constant: 1.4,
            num_search_threads: 4,
            batch_size: 16,

            use_rzone: true,
            use_block_tt: true,
            use_grid_tt: false,
            use_ghi_check: true,

            rzone_tt_block_bits: 20,
            rzone_tt_grid_bits: 16,
            use_timer_in_tt: false,

            manager_pcn_value_threshold: 0.1,
            manager_top_k_selection: 3,
            use_virtual_solved: true,
            manager_send_and_player_job: true,
            use_solved_positions: true,
            use_online_fine_tuning: true,
            use_critical_positions: true,
            manager_critical_positions_n: 1_000,
            manager_critical_positions_m: 100,

            broker_address: "127.0.0.1".to_string(),
            broker_port: 9_999,
            max_outstanding_jobs: 64,
            job_wait_timeout_ms: 5_000,

            board_size: 7,

            nn_discrete_value_size: 601,
        }
    }

    pub fn validate(&self) -> Result<(), crate::error::GsError> {
        if self.num_rollouts == 0 {
            return Err(crate::error::GsError::InvalidConfig(
                "num_rollouts must be non-zero".to_string(),
            ));
        }
        if self.board_size == 0 {
            return Err(crate::error::GsError::InvalidConfig(
                "board_size must be non-zero".to_string(),
            ));
        }
        if self.manager_top_k_selection == 0 {
            return Err(crate::error::GsError::InvalidConfig(
                "manager_top_k_selection must be non-zero".to_string(),
            ));
        }
        if self.manager_critical_positions_n == 0 {
            return Err(crate::error::GsError::InvalidConfig(
                "manager_critical_positions_n must be non-zero".to_string(),
            ));
        }
        if self.manager_critical_positions_m > self.manager_critical_positions_n {
            return Err(crate::error::GsError::InvalidConfig(
                "manager_critical_positions_m must not exceed manager_critical_positions_n".to_string(),
            ));
        }
        if self.nn_discrete_value_size == 0 {
            return Err(crate::error::GsError::InvalidConfig(
                "nn_discrete_value_size must be non-zero".to_string(),
            ));
        }
        if self.use_block_tt && self.use_grid_tt {
            return Err(crate::error::GsError::InvalidConfig(
                "use_block_tt and use_grid_tt are mutually exclusive".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::new().validate().is_ok());
    }

    #[test]
    fn rejects_zero_rollouts() {
        let mut config = Config::new();
        config.num_rollouts = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_critical_positions_m_above_n() {
        let mut config = Config::new();
        config.manager_critical_positions_m = config.manager_critical_positions_n + 1;

        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_block_and_grid_tt_together() {
        let mut config = Config::new();
        config.use_block_tt = true;
        config.use_grid_tt = true;

        assert!(config.validate().is_err());
    }
}
