/// Terminal rendering surface abstraction
///
/// The multiplexer writes output bytes into a surface and reads locally typed
/// input back out of it. It never renders anything itself.
use devshell_types::Geometry;

use crate::error::Result;

/// Callback receiving input typed into a surface
pub type InputHandler = Box<dyn FnMut(String)>;

pub trait RenderingSurface {
    /// Render output bytes in receipt order
    fn write(&mut self, data: &str);

    /// Fit the surface to its container and report the resulting geometry.
    /// Returns `None` while the container is not laid out.
    fn fit(&mut self) -> Option<Geometry>;

    /// Move keyboard focus into the surface
    fn focus(&mut self);

    /// Release the surface and its container
    fn dispose(&mut self);

    /// Register the handler that receives locally typed input
    fn on_local_input(&mut self, handler: InputHandler);
}

/// Builds one surface per tab
pub trait SurfaceFactory {
    fn create(&mut self, session_id: &str) -> Result<Box<dyn RenderingSurface>>;
}
