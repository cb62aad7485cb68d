//! Visualization side of the engine
//!
//! Everything here runs on the observer thread and turns what the audio
//! thread publishes into drawable polylines:
//!
//! - `fft` - windowed magnitude spectrum
//! - `spectrum` - per-channel analyzer state machine and spectrum path
//! - `response` - combined filter response path and the change flag
//! - `observer` - the refresh loop tying the above together
//! - `path` - polylines, log axis, grid lines

pub mod fft;
pub mod observer;
pub mod path;
pub mod response;
pub mod spectrum;

pub use fft::{blackman_harris, FftDataGenerator};
pub use observer::{Observer, TickReport};
pub use path::{frequency_grid, gain_grid, map_from_log10, map_to_log10, GridLine, Path, Point, Rect};
pub use response::{ParameterChangeFlag, ResponseCurve};
pub use spectrum::{AnalyzerState, SpectrumAnalyzer};
