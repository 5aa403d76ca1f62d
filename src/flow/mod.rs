//! Interactive state machines.
//!
//! Each machine is a reducer mapping `(state, event)` to effects, so it can
//! be replayed in tests without a terminal:
//!
//! - [`wizard`]: stage routing for `create`.
//! - [`delete`]: staged confirmation and grace period for `delete`,
//!   driven by [`event_loop::run_delete`].

pub mod delete;
pub mod event_loop;
pub mod wizard;

pub use delete::{DeleteEffect, DeleteEvent, DeleteSession, DeleteState};
pub use event_loop::{DeleteOutcome, GRACE_TICK, run_delete};
pub use wizard::{Draft, Stage, Wizard};
