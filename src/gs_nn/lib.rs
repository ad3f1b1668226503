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

//! The neural network itself is an external collaborator (`spec.md`
//! treats it as a black box) -- this crate only carries the *shape* of
//! the teacher's NN boundary (`dg_nn`'s forward-pass request/response),
//! not a device implementation. `gs_mcts` depends on `Predictor` instead
//! of any concrete network so that tests can swap in a stand-in.

extern crate gs_core;
extern crate gs_env;

pub mod predictor;

pub use self::predictor::{PredictRequest, PredictResponse, Predictor};
