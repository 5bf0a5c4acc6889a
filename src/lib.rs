// Copyright 2022, The Android Open Source Project
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

//! LE connection establishment and lifecycle management.
//!
//! The [`connection::LeConnectionManager`] owns the accept-list initiator
//! state machine and the table of live connections. It is constructed by
//! the composition root with its collaborators (controller command
//! interface, address manager, packet scheduler) and must live on a single
//! serial execution context: a current-thread tokio runtime with a
//! `LocalSet`, onto which the transport delivers command completions and
//! controller events.

pub mod connection;
pub mod core;
pub mod utils;
