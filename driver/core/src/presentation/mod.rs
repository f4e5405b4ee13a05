// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`gitvol-core`)
//!
//! Docker volume plugin surface that translates engine requests into
//! application service calls. No business logic lives here; all real work is
//! delegated to `crate::application::volume_manager`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`plugin_api`] | HTTP (Axum) over a Unix socket | `Plugin.Activate` and the `VolumeDriver.*` endpoints |

pub mod plugin_api;
