pub mod compiler;
pub mod config;
pub mod gateway;
pub mod jobs;
pub mod lifecycle;
pub mod manager;
pub mod remote;
pub mod sql;
pub mod terminal;

#[cfg(test)]
pub(crate) mod test_support;
