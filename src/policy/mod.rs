// src/policy/mod.rs

pub mod comment_rules;
