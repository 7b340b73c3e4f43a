// src/models/mod.rs

pub mod category;
pub mod comment;
pub mod notification;
pub mod post;
pub mod user;
