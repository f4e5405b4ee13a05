// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Core of the gitvol volume driver: git repositories exposed as
//! lazily-materialized container volumes.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Volume catalog, mount lifecycle, credential resolution and the plugin API

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
