// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod homework;
pub mod questionnaire;
pub mod quiz;
