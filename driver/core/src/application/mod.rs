// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod volume_manager;
pub mod volume_options;
pub mod volume_registry;

// Re-export use cases for convenience
pub use volume_manager::{StandardVolumeService, VolumeService};
pub use volume_options::CreateVolumeOptions;
pub use volume_registry::VolumeRegistry;
