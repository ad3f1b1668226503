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

use std::fmt;

/// A single move. `Pass` only ever arises in Hex's resignation-free rules
/// as a structural placeholder -- Killall-Go has no legal pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Play(usize),
    Pass,
}

impl Action {
    pub fn position(self) -> Option<usize> {
        match self {
            Action::Play(pos) => Some(pos),
            Action::Pass => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::Play(pos) => write!(fmt, "{}", pos),
            Action::Pass => write!(fmt, "pass"),
        }
    }
}
