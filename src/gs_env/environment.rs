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

use gs_core::bitboard::Bitboard;
use gs_core::hashkey::HashKey;

use crate::action::Action;
use crate::player::Player;

/// Game-specific rules, implemented once per supported game (Hex,
/// Killall-Go) and consumed by `gs_mcts` through this one capability
/// trait rather than compile-time `#if HEX / #if KILLALLGO` branches in
/// the search core.
pub trait Environment: Clone {
    /// Player to move in the current position.
    fn turn(&self) -> Player;

    /// All positions `turn()` may legally play into.
    fn legal_actions(&self) -> Vec<Action>;

    /// Applies `action` for the current player and advances `turn()`.
    /// Panics if `action` is not legal, matching the teacher's style of
    /// asserting preconditions rather than threading an error return
    /// through the hot simulation loop.
    fn apply(&mut self, action: Action);

    /// The winner of a terminal position, or `None` if the game has not
    /// concluded.
    fn winner(&self) -> Option<Player>;

    /// Running Zobrist hash of the position, incrementally maintained by
    /// `apply`.
    fn hash_key(&self) -> HashKey;

    /// Stones (or walls, for Hex's virtual border cells) currently on the
    /// board for `player`.
    fn stones(&self, player: Player) -> Bitboard;

    /// Number of addressable grids on this board, used to size
    /// `legal_actions` iteration and R-zone dilation.
    fn num_positions(&self) -> usize;
}
