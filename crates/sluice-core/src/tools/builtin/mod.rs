pub mod archive;
pub mod time;
pub mod weather;

pub use archive::{ArchiveQueryTool, ArchiveStore, SampleArchive};
pub use time::CurrentTimeTool;
pub use weather::{OfflineWeather, QWeather, WeatherBackend, WeatherTool};
