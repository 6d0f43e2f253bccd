//! Traits and interfaces for surface-agnostic content loading

use anyhow::Result;
use async_trait::async_trait;

/// A growable, externally controlled surface such as a scrollable document
/// or a paginated list.
///
/// The loader only ever talks to the page through these three capabilities,
/// so any stand-in offering them can be driven the same way as a live tab.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Read the current growth measure (scrollable height, item count, ...).
    ///
    /// Must not change the surface: calling it twice in a row returns the
    /// same value unless the environment itself moved.
    async fn measure(&self) -> Result<i64>;

    /// Perform the action expected to produce more content, e.g. scroll to
    /// the end of the document.
    async fn grow(&self) -> Result<()>;

    /// Look for a "load more" control and activate it.
    ///
    /// # Returns
    /// * `Result<bool>` - whether a control was found and activated this cycle
    async fn reveal_more(&self) -> Result<bool> {
        Ok(false)
    }
}
