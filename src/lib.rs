pub mod forward;
pub mod logging;
