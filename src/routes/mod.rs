/**
 * Routes Module
 * API route handlers
 */

pub mod admin;
pub mod appointments;
pub mod chat;
pub mod health;
pub mod journal;
pub mod moderation;
pub mod mood;
pub mod points;
pub mod profile;
pub mod therapists;

#[cfg(test)]
pub(crate) mod test_support;
