pub mod config;
pub mod history;
pub mod init;
pub mod mine;
pub mod project;
pub mod subtask;
pub mod task;
pub mod user;
