pub use configure::SetArgs;
pub use configure::list_timezones;
pub use configure::set_config;

pub use control::backup_now;
pub use control::start_service;
pub use control::stop_service;

pub use status::show_status;

pub mod configure;
pub mod control;
pub mod status;
