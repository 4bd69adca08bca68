pub mod config;
pub mod error;
pub mod logging;
pub mod market;
pub mod replay;
pub mod state;

pub use config::{ReplayArgs, ReplayConfig};
pub use error::ReplayError;
pub use market::types::{DepthSnapshot, PriceLevel, SessionRows, SessionStats, Trade, TradeSide};
pub use replay::playback::{PlaybackController, PlaybackState, PlaybackStatus};
pub use replay::session::{ReplayFrame, ReplaySession, TimelineOptions};
pub use replay::window::Viewport;
pub use state::ReplayRuntime;
