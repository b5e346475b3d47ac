//! StackFlow Cloud
//!
//! Provisioning engine for StackFlow stacks. The engine turns a validated
//! [`stackflow_core::Stack`] into a [`Plan`] against the recorded state and
//! applies it through a [`CloudProvider`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  StackFlow CLI                   │
//! │              (stack plan/up/down)                │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │     Engine (plan / apply / destroy)      │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────────┐  ┌──────────────┐         │
//! │  │ trait CloudProvider│ │  State Mgmt  │         │
//! │  └──────────────────┘  └──────────────┘         │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │  aws provider │
//! └───────────────┘
//! ```

pub mod action;
pub mod engine;
pub mod error;
pub mod provider;
pub mod state;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use engine::{Engine, compute_plan, resolve_outputs};
pub use error::{CloudError, Result};
pub use provider::{AuthStatus, CloudProvider, MANAGED_TAG_KEY, ProvisionResult, ResolvedResource};
pub use state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
