mod common;
mod engine;
mod report;
mod service;
