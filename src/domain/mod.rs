//! Entities and workflow rules. Nothing in here performs I/O.

pub mod appointments;
pub mod directory;
pub mod gamification;
pub mod journal;
pub mod moderation;
pub mod mood;
pub mod profile;
pub mod stats;
