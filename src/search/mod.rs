// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Web search backends

pub mod exa;

pub use exa::ExaSearchClient;
