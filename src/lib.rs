// Library exports for Facial Expressions Detection

pub mod camera;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod expression;
pub mod models;
pub mod state;
pub mod ui;
