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

extern crate gs_core;
extern crate gs_env;
extern crate gs_nn;
extern crate ordered_float;
extern crate rand;

pub mod knowledge;
pub mod rzone;
pub mod solver;
pub mod time_control;
pub mod tree;
pub mod tt;

pub use self::solver::{GhiData, Solver};
pub use self::tree::{SolverStatus, Tree};
