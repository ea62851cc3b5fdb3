// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeforge contributors

//! Utility modules
//!
//! Common utilities for the pipeforge CLI.

pub mod colors;

pub use colors::*;
