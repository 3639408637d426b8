// src/models/mod.rs

pub mod level;
pub mod question;
pub mod quiz;
pub mod reward;
pub mod score;
pub mod session;
pub mod user;
