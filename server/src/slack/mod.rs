pub mod client;
pub mod models;

#[cfg(test)]
pub(crate) mod fake;
