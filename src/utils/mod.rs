pub mod math;
pub mod sexagesimal;
pub mod io_utils;
pub mod log_utils;
pub mod timer;
