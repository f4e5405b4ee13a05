// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod git;
pub mod secrets;
pub mod state_store;

pub use git::Git2Client;
pub use secrets::SecretProviderRegistry;
pub use state_store::{InMemoryVolumeStateStore, JsonFileStateStore};
