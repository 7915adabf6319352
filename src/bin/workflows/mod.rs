mod build;
mod commands;
mod layout;
mod query;

pub(crate) use commands::dispatch;
pub(crate) use layout::{locate_repo_root, open_toolkit};
