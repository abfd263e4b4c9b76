//! Skill learning: a two-stage consumer chain. The distiller turns a
//! terminal task into a structured analysis; the skill agent mutates the
//! learning space's skill library under a per-space lock.

pub mod agent;
pub mod consumer;
pub mod ctx;
pub mod distill;
pub mod prompt;
pub mod skill_md;
pub mod tools;

pub use consumer::register;
