//! Access decisions
//!
//! [`AccessGate`] answers "may this identity proceed right now" for every
//! inbound event:
//!
//! 1. administrators always proceed, without a record being touched
//! 2. unknown identities get an expired record with no quota
//! 3. an active, unexpired paid plan proceeds without using quota
//! 4. otherwise one free use is consumed if any is left
//! 5. otherwise the event is denied with a reply naming the identity
//!
//! Group events are decided on the group's identity first; a denied group
//! blocks the event whatever the sender's own plan.

pub mod admins;
pub mod event;
pub mod gate;

pub use admins::AdminSet;
pub use event::{Decision, EventAction, Grant, InboundEvent, Outcome, Verdict};
pub use gate::AccessGate;
