// Calibration module - template capture workflow
//
// 1. CalibrationSession collects live frames for one class at a time
// 2. The tail of the buffer is checked against the silence floor
// 3. Accepted tails are committed to the TemplateStore
//
// Sequential sessions walk kick, snare and hi-hat in that order.

pub mod progress;
pub mod session;
pub mod templates;

pub use progress::{CalibrationProgress, DrumClass};
pub use session::{CalibrationSession, CalibrationState, CalibrationTick};
pub use templates::{TemplateFlags, TemplateStore};
