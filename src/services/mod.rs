pub mod analytics;
pub mod attempts;
pub mod homework;
pub mod questionnaire;
pub mod quizzes;
pub mod roster;
pub mod scoring;
pub mod seed;
pub mod session;
