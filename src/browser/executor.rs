//! Browser executor capability contract
//!
//! Every backend (local or hosted) implements this trait; the agent and the
//! dispatcher never see a concrete backend.

use async_trait::async_trait;

use crate::core::{MouseButton, Point, Result, Screenshot};

/// Primitive operations a browser backend must provide
///
/// One executor is driven by one agent at a time. Methods take `&self` so a
/// backend can be shared behind an `Arc`, but callers never issue two
/// primitives concurrently.
#[async_trait]
pub trait BrowserExecutor: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Viewport size in pixels
    fn dimensions(&self) -> (u32, u32);

    /// Capture the current viewport as PNG
    async fn screenshot(&self) -> Result<Screenshot>;

    /// URL of the current page
    async fn current_url(&self) -> Result<String>;

    async fn click(&self, at: Point, button: MouseButton) -> Result<()>;

    async fn double_click(&self, at: Point) -> Result<()>;

    /// Type text at the current focus
    async fn type_text(&self, text: &str) -> Result<()>;

    /// Press keys; more than one key is pressed as a chord in order
    async fn press(&self, keys: &[String]) -> Result<()>;

    /// Scroll by a delta, optionally with the pointer at a position first
    async fn scroll(&self, at: Option<Point>, dx: i64, dy: i64) -> Result<()>;

    /// Drag along a path of at least two points
    async fn drag(&self, path: &[Point]) -> Result<()>;

    async fn move_to(&self, at: Point) -> Result<()>;

    async fn goto(&self, url: &str) -> Result<()>;

    async fn back(&self) -> Result<()>;

    async fn forward(&self) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    /// Release the session
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
