//! Arbitration of the single touch channel.
//!
//! - **`tracker`**   – Raw events to the [`ActiveIntentSet`](crate::ActiveIntentSet).
//! - **`scheduler`** – Decides who owns the channel and emits primitives.
//! - **`emergency`** – Latch that overrides everything else.
//!
//! All three run on one decision path.  Only [`scheduler::TouchScheduler`]
//! writes the touch state; the emergency latch is the one piece that may be
//! flipped from another thread.

pub mod emergency;
pub mod scheduler;
pub mod tracker;
