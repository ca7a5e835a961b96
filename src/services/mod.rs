pub mod render_service;
pub mod sync_service;

pub use render_service::PngRenderer;
pub use sync_service::{ChartSync, RenderError, RenderSurface, SyncError};
