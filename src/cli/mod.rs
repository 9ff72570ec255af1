pub mod app;
pub mod commands;
pub mod compose;
pub mod demo;
pub mod dispatch;
pub mod env;
pub mod run;
pub mod runtime;
