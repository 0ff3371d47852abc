pub mod archive;
pub mod time;
pub mod weather;

pub use archive::ARCHIVE_QUERY_TOOL_NAME;
pub use time::CURRENT_TIME_TOOL_NAME;
pub use weather::WEATHER_TOOL_NAME;
