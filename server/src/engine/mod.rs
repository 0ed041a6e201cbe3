pub mod channel;
pub mod context;
pub mod directory;
pub mod registry;
