// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! stackd core engine.
//!
//! Dispatches stack provisioning jobs to an external orchestration service,
//! polls them to completion, compensates failed creates, and reports each
//! outcome to the downstream listener.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
