//! Event plumbing shared by the async layers: debounced hooks and
//! generation counters for dropping stale responses.

pub mod debounce;
pub mod generation;

pub use debounce::{
  AsyncHook,
  HookSender,
};
pub use generation::{
  Generation,
  Latest,
  Ticket,
};
