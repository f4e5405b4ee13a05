// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Volume records, capability traits and driver configuration.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and contracts shared by every other layer

pub mod node_config;
pub mod repository;
pub mod secret;
pub mod source_control;
pub mod volume;
