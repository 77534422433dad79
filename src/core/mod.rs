//! Core模块 - 先修逻辑模型与求值

pub mod catalog;
pub mod error;
pub mod graph;
pub mod models;
pub mod requirement;
pub mod resolver;
pub mod validator;

#[cfg(test)]
mod sim_integration_tests;
