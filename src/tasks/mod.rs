// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Background request handling

pub mod manager;
pub mod task;

pub use manager::TaskManager;
pub use task::{AsyncTask, SubmitResponse, TaskState, TaskSubscription};
