//! Domain entities for keytouch.
//!
//! This module contains pure rules with no infrastructure dependencies.
//!
//! # What lives here? (for beginners)
//!
//! Everything in `domain` can be compiled and tested without a desktop, a
//! phone or a config file.  Types describe *what* the player wants (an
//! intent), *where* on the phone screen that lands (the mapper), and *which*
//! wishes are currently allowed (the mode machine).  Deciding *when* each wish
//! gets the single touch point is the job of `arbitration`, one layer up.

pub mod binding;
pub mod geometry;
pub mod input;
pub mod intent;
pub mod mapper;
pub mod mode;
pub mod touch;
