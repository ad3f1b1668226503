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

//! Drives a `gs_mcts::Solver` across a whole game tree rather than one
//! root position: dispatches tractable-looking leaves to remote workers
//! through `gs_broker`, integrates their results back into the tree, and
//! periodically broadcasts openings the search keeps returning to.
//! Grounded in `original_source/game_solver/manager/manager.cpp`'s
//! `Manager`.

extern crate gs_broker;
extern crate gs_core;
extern crate gs_env;
extern crate gs_mcts;
extern crate gs_nn;
extern crate log;
extern crate rand;

pub mod manager;
pub mod recent_selection_path;

pub use self::manager::Manager;
