pub mod capture;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod labels;
pub mod landmarks;
pub mod manager;
pub mod overlay;
pub mod session;
pub mod sim;
pub mod store;

pub use config::SessionConfig;
pub use error::{GestureErr, Result};
pub use manager::{ModelManager, Phase, Prediction};
pub use session::{Command, Session, SessionEvent};
pub use store::SampleStore;
