pub mod render;

pub use render::{FrameStats, ScreenRenderer, TextRenderer, progress_bar, timer_pill};
