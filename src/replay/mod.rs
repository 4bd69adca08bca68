pub mod driver;
pub mod playback;
pub mod series;
pub mod session;
pub mod timeline;
pub mod window;
