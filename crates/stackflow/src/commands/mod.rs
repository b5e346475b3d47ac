pub mod down;
pub mod init;
pub mod output;
pub mod plan;
pub mod state;
pub mod up;
pub mod validate;
