/// Resize coordinator
///
/// Viewport changes are coalesced: every change bumps a generation counter
/// and schedules a flush; only the flush carrying the latest generation does
/// any work.
use std::time::Duration;

use devshell_types::Geometry;

use crate::surface::RenderingSurface;

#[derive(Debug, Clone)]
pub struct ResizeCoordinator {
    generation: u64,
    debounce: Duration,
    fallback: Geometry,
}

impl ResizeCoordinator {
    pub fn new(debounce: Duration, fallback: Geometry) -> Self {
        Self {
            generation: 0,
            debounce,
            fallback,
        }
    }

    /// Record a viewport change; returns the ticket to flush with after `debounce()`
    pub fn viewport_changed(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// True only for the ticket of the most recent change
    pub fn is_current(&self, ticket: u64) -> bool {
        ticket == self.generation
    }

    /// Fit the surface and report the geometry to send, falling back to the
    /// default while the surface is not laid out
    pub fn measure(&self, surface: &mut dyn RenderingSurface) -> Geometry {
        match surface.fit() {
            Some(geometry) if !geometry.is_empty() => geometry,
            _ => self.fallback,
        }
    }
}
