pub mod billing;
pub mod engine;
pub mod modules;
pub mod web;
