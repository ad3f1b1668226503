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

//! The R-zone transposition table: a block-TT keyed by an XOR-accumulated
//! sequence of Zobrist hash keys over the nodes inside a winner's R-zone.
//!
//! The original also carries a *grid*-TT alternative, selected by
//! `use_grid_tt`, but `rzone_tt_handler.cpp`'s `storeGridTT`/`lookupGridTT`
//! bodies are commented out behind a standing `// TODO: fix this`, and the
//! code inside the comment references `rzone_bitboard_`/`empty_bitboard_`/
//! `stone_bitboard_` fields that `RZoneTTPattern` (`rzone_tt_pattern.h`)
//! does not even declare -- it could not have compiled, let alone run, in
//! the state it was left in. `use_grid_tt` is kept as a config switch since
//! the surrounding dispatch (`RZoneTTHandler::storeTT`/`lookupTT`) names it
//! as a real option, but selecting it faithfully reproduces the original's
//! behavior: storing is a no-op and lookups always miss. See `DESIGN.md`.

use std::collections::VecDeque;
use std::time::Duration;

use gs_core::hashkey::HashKey;
use gs_core::tt::OpenAddressHashTable;
use gs_env::Player;

use crate::tree::NONE;

#[derive(Debug, Clone)]
pub struct RZoneTtPattern {
    pub ko_position: Option<usize>,
    pub timestamp: i64,
    pub node_index: i32,
    pub turn: Player,
}

impl Default for RZoneTtPattern {
    fn default() -> Self {
        Self { ko_position: None, timestamp: -1, node_index: NONE, turn: Player::Black }
    }
}

#[derive(Clone, Default)]
struct RZoneTtData {
    tt_max_id: i64,
    patterns: VecDeque<RZoneTtPattern>,
}

/// Lookup/store counters mirroring `RZoneTTStatistic`, gated by
/// `Config::use_timer_in_tt`.
#[derive(Debug, Clone, Default)]
pub struct RZoneTtStatistic {
    pub num_pattern_size: u64,
    pub num_lookup: u64,
    pub num_store: u64,
    pub num_hit: u64,
    pub num_reconstruct: u64,
    pub num_traverse: u64,
    pub num_compare: u64,
    pub lookup_time: Duration,
    pub store_time: Duration,
}

struct RZoneTt {
    table: OpenAddressHashTable<RZoneTtData>,
    tt_size: i64,
    statistic: RZoneTtStatistic,
}

impl RZoneTt {
    fn new(bit_size: u32) -> Self {
        Self {
            table: OpenAddressHashTable::new(bit_size),
            tt_size: 0,
            statistic: RZoneTtStatistic::default(),
        }
    }

    fn clear(&mut self) {
        self.table.clear();
        self.tt_size = 0;
        self.statistic = RZoneTtStatistic::default();
    }

    fn store_pattern(&mut self, key: HashKey, pattern: RZoneTtPattern) {
        if self.table.lookup(key).is_none() {
            self.table.store(key, RZoneTtData::default());
        }
        self.table.lookup_mut(key).unwrap().patterns.push_front(pattern);
        self.tt_size += 1;
    }
}

/// Owns both TT variants; `Config`'s `use_block_tt`/`use_grid_tt` decide
/// which one `store_tt`/`lookup_tt` consult, mirroring `RZoneTTHandler`.
pub struct RZoneTtHandler {
    block_tt: RZoneTt,
    grid_tt: RZoneTt,
}

impl RZoneTtHandler {
    pub fn new(block_bits: u32, grid_bits: u32) -> Self {
        Self {
            block_tt: RZoneTt::new(block_bits),
            grid_tt: RZoneTt::new(grid_bits),
        }
    }

    pub fn clear(&mut self) {
        self.block_tt.clear();
        self.grid_tt.clear();
    }

    pub fn block_statistic(&self) -> &RZoneTtStatistic {
        &self.block_tt.statistic
    }

    pub fn grid_statistic(&self) -> &RZoneTtStatistic {
        &self.grid_tt.statistic
    }

    /// `RZoneTTHandler::storeTT`: dispatches to whichever variant `Config`
    /// selects. The grid branch mirrors the original's own dead
    /// `storeGridTT` -- see this module's doc comment -- so it only
    /// counts the attempt and stores nothing.
    pub fn store_tt(&mut self, use_block_tt: bool, use_grid_tt: bool, hashkey_sequence: &[HashKey], pattern: RZoneTtPattern) {
        if use_block_tt {
            self.store_block_tt(hashkey_sequence, pattern);
        } else if use_grid_tt {
            self.grid_tt.statistic.num_store += 1;
        }
    }

    /// `RZoneTTHandler::lookupTT`: dispatches to whichever variant
    /// `Config` selects. The grid branch mirrors the original's own dead
    /// `lookupGridTT`, which always misses.
    pub fn lookup_tt<F>(&mut self, use_block_tt: bool, use_grid_tt: bool, hashkey_sequence: &[HashKey], start_id: i64, matches: F) -> Option<RZoneTtPattern>
    where
        F: FnMut(&RZoneTtPattern) -> bool,
    {
        if use_block_tt {
            self.lookup_block_tt(hashkey_sequence, start_id, matches)
        } else if use_grid_tt {
            self.grid_tt.statistic.num_lookup += 1;
            None
        } else {
            None
        }
    }

    /// Stores the block-TT entry for a node's hash-key sequence, XOR
    /// accumulating one prefix at a time and bumping `tt_max_id` on every
    /// intermediate node so later lookups can cheaply reject stale
    /// entries via a monotonic timestamp comparison (§4.6).
    pub fn store_block_tt(&mut self, hashkey_sequence: &[HashKey], pattern: RZoneTtPattern) {
        self.block_tt.statistic.num_store += 1;
        self.block_tt.statistic.num_pattern_size += 1;

        let mut accumulated: HashKey = 0;
        for &key in hashkey_sequence {
            accumulated ^= key;
            if self.block_tt.table.lookup(accumulated).is_none() {
                self.block_tt.table.store(accumulated, RZoneTtData::default());
            }
            self.block_tt.table.lookup_mut(accumulated).unwrap().tt_max_id = self.block_tt.tt_size;
        }

        self.block_tt.store_pattern(accumulated, pattern);
    }

    /// Recursively walks every subset-prefix of `hashkey_sequence`
    /// starting at index 1 (index 0 is the leading sentinel `0` pushed by
    /// `KnowledgeHandler::hash_key_sequence`), returning the first stored
    /// pattern whose `start_id` clears `start_id` and whose board state
    /// still matches, mirroring `lookupBlockTTRecursive`.
    pub fn lookup_block_tt<F>(&mut self, hashkey_sequence: &[HashKey], start_id: i64, mut matches: F) -> Option<RZoneTtPattern>
    where
        F: FnMut(&RZoneTtPattern) -> bool,
    {
        self.block_tt.statistic.num_lookup += 1;
        let mut accumulated: HashKey = 0;
        let result = Self::lookup_block_tt_recursive(&mut self.block_tt, hashkey_sequence, 1, &mut accumulated, start_id, &mut matches);
        if result.is_some() {
            self.block_tt.statistic.num_hit += 1;
        }
        result
    }

    fn lookup_block_tt_recursive<F>(
        block_tt: &mut RZoneTt,
        hashkey_sequence: &[HashKey],
        start: usize,
        accumulated: &mut HashKey,
        start_id: i64,
        matches: &mut F,
    ) -> Option<RZoneTtPattern>
    where
        F: FnMut(&RZoneTtPattern) -> bool,
    {
        block_tt.statistic.num_traverse += 1;
        if let Some(data) = block_tt.table.lookup(*accumulated) {
            if start_id <= data.tt_max_id {
                for pattern in &data.patterns {
                    block_tt.statistic.num_compare += 1;
                    if start_id > pattern.timestamp {
                        break;
                    }
                    if matches(pattern) {
                        return Some(pattern.clone());
                    }
                }
            } else {
                return None;
            }
        } else {
            return None;
        }

        for i in start..hashkey_sequence.len() {
            *accumulated ^= hashkey_sequence[i];
            if let Some(found) = Self::lookup_block_tt_recursive(block_tt, hashkey_sequence, start + 1, accumulated, start_id, matches) {
                return Some(found);
            }
            *accumulated ^= hashkey_sequence[i];
        }

        None
    }

    pub fn current_tt_size(&self) -> i64 {
        self.block_tt.tt_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_tt_round_trips_a_pattern() {
        let mut handler = RZoneTtHandler::new(8, 8);
        let sequence = vec![0, 123];
        let pattern = RZoneTtPattern { ko_position: None, timestamp: 0, node_index: 5, turn: Player::Black };

        handler.store_block_tt(&sequence, pattern);

        let found = handler.lookup_block_tt(&sequence, 0, |_| true);
        assert!(found.is_some());
        assert_eq!(found.unwrap().node_index, 5);
    }

    #[test]
    fn block_tt_respects_start_id_cutoff() {
        let mut handler = RZoneTtHandler::new(8, 8);
        let sequence = vec![0, 42];
        let pattern = RZoneTtPattern { ko_position: None, timestamp: 0, node_index: 1, turn: Player::Black };
        handler.store_block_tt(&sequence, pattern);

        let stale = handler.current_tt_size();
        let found = handler.lookup_block_tt(&sequence, stale + 1, |_| true);
        assert!(found.is_none());
    }

    #[test]
    fn store_tt_dispatches_to_block_tt_when_selected() {
        let mut handler = RZoneTtHandler::new(8, 8);
        let sequence = vec![0, 7];
        let pattern = RZoneTtPattern { ko_position: None, timestamp: 0, node_index: 9, turn: Player::Black };

        handler.store_tt(true, false, &sequence, pattern);

        let found = handler.lookup_tt(true, false, &sequence, 0, |_| true);
        assert_eq!(found.unwrap().node_index, 9);
    }

    #[test]
    fn grid_tt_never_stores_or_hits() {
        let mut handler = RZoneTtHandler::new(8, 8);
        let sequence = vec![0, 7];
        let pattern = RZoneTtPattern { ko_position: None, timestamp: 0, node_index: 9, turn: Player::Black };

        handler.store_tt(false, true, &sequence, pattern);

        assert!(handler.lookup_tt(false, true, &sequence, 0, |_| true).is_none());
        assert_eq!(handler.grid_statistic().num_store, 1);
        assert_eq!(handler.grid_statistic().num_hit, 0);
    }
}
