pub mod check_handlers;
pub mod command_handlers;
pub mod render;
