// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0
//! gitvol CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers and the plugin server entry point

pub mod daemon;
pub mod commands;
