pub mod config;
pub mod input;
pub mod logging;
pub mod scrollback;

pub use config::Config;
pub use input::Mailbox;
pub use scrollback::Scrollback;
