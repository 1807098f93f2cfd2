// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconcilers that converge actual cluster state to the desired state.

pub mod ingress;

pub use ingress::{build_ingress, plan, IngressReconciler, RouteAction};
