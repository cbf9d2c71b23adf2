// src/models/mod.rs

pub mod homework;
pub mod questionnaire;
pub mod quiz;
pub mod roster;
pub mod user;
