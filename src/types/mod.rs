// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Snapshot and ownership types shared by the translator and the reconciler.

pub mod owner;
pub mod state;

pub use owner::{controller_of, owning_service_key};
pub use state::{ActualState, DesiredState};
