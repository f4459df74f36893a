// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod context;
pub mod dispatcher;
pub mod worker;

pub use context::EngineContext;
pub use dispatcher::WorkerDispatcher;
pub use worker::{StackWorker, WorkerState};
