pub mod config;
pub mod help;
pub mod history;
pub mod midi;
pub mod ops;
pub mod pianoroll;
pub mod query;
pub mod session;
pub mod song;
pub mod time;
pub mod tracker;
