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

//! A minimal move-sequence codec in the spirit of SGF's `;B[ab];W[cd]`
//! move nodes. This is *not* a general SGF file reader/writer -- loading
//! full game records from disk is out of scope -- it exists only because
//! the broker wire protocol (`solver_job.cpp`'s `getSolverJobSgf`) ships a
//! position as a move sequence string.

use gs_core::error::GsError;

use crate::action::Action;
use crate::player::Player;

fn position_to_coord(pos: usize, size: usize) -> String {
    let row = pos / size;
    let col = pos % size;
    let letter = (b'a' + col as u8) as char;

    format!("{}{}", letter, row + 1)
}

fn coord_to_position(coord: &str, size: usize) -> Result<usize, GsError> {
    let mut chars = coord.chars();
    let letter = chars
        .next()
        .ok_or_else(|| GsError::InvalidJob(format!("empty coordinate in '{}'", coord)))?;

    if !letter.is_ascii_lowercase() {
        return Err(GsError::InvalidJob(format!("bad column letter in '{}'", coord)));
    }
    let col = (letter as u8 - b'a') as usize;

    let row: usize = chars
        .as_str()
        .parse()
        .map_err(|_| GsError::InvalidJob(format!("bad row number in '{}'", coord)))?;
    if row == 0 {
        return Err(GsError::InvalidJob(format!("row must be >= 1 in '{}'", coord)));
    }
    let row = row - 1;

    if col >= size || row >= size {
        return Err(GsError::InvalidJob(format!("coordinate '{}' out of bounds", coord)));
    }

    Ok(row * size + col)
}

/// Serializes a sequence of (player, action) moves into `;B[ab];W[cd]`
/// style move nodes, in playing order.
pub fn encode(moves: &[(Player, Action)], size: usize) -> String {
    let mut out = String::new();

    for &(player, action) in moves {
        let tag = match player {
            Player::Black => "B",
            Player::White => "W",
        };
        let body = match action {
            Action::Play(pos) => position_to_coord(pos, size),
            Action::Pass => String::new(),
        };

        out.push(';');
        out.push_str(tag);
        out.push('[');
        out.push_str(&body);
        out.push(']');
    }

    out
}

/// Parses a move sequence produced by `encode`.
pub fn decode(text: &str, size: usize) -> Result<Vec<(Player, Action)>, GsError> {
    let mut moves = Vec::new();

    for node in text.split(';').filter(|node| !node.is_empty()) {
        let (tag, rest) = node.split_at(1);
        let player = match tag {
            "B" => Player::Black,
            "W" => Player::White,
            _ => return Err(GsError::InvalidJob(format!("unknown player tag '{}'", tag))),
        };

        let body = rest
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| GsError::InvalidJob(format!("malformed move node '{}'", node)))?;

        let action = if body.is_empty() {
            Action::Pass
        } else {
            Action::Play(coord_to_position(body, size)?)
        };

        moves.push((player, action));
    }

    Ok(moves)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_move_sequence() {
        let moves = vec![
            (Player::Black, Action::Play(0)),
            (Player::White, Action::Play(8)),
            (Player::Black, Action::Pass),
        ];

        let text = encode(&moves, 3);
        let decoded = decode(&text, 3).unwrap();

        assert_eq!(moves, decoded);
    }

    #[test]
    fn rejects_out_of_bounds_coordinate() {
        let result = decode(";B[z9]", 3);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_malformed_node() {
        let result = decode(";Bab", 3);
        assert!(result.is_err());
    }
}
