pub mod app;
mod commands;
mod config;
mod context;
mod dispatch;
mod env;
mod info;
mod output;
mod plan;
mod run;
mod runtime;
mod serve;
