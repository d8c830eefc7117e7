pub mod api_connection;
pub mod app;
pub mod auth;
pub mod cache;
pub mod catalogue;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod export;
pub mod models;
pub mod nutrition;
pub mod planner;
pub mod recipe_detail;
pub mod recipe_form;
pub mod recipe_parser;
pub mod store;
pub mod theme;
pub mod today;
