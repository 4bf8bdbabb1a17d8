pub mod analysis;
pub mod backoffice;
pub mod notifier;
pub mod rooms;
