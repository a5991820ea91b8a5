//! Scoped render target binding

use std::ops::{Deref, DerefMut};

use crate::backend::traits::{BackendResult, GraphicsBackend, TargetBinding};

/// Saves the bound target pair on creation and rebinds it on drop.
///
/// The restore runs on every exit path, so a pass that fails halfway
/// through still leaves the next pass drawing where it expects.
pub struct TargetScope<'a, B: GraphicsBackend + ?Sized> {
    backend: &'a mut B,
    saved: TargetBinding,
}

impl<'a, B: GraphicsBackend + ?Sized> TargetScope<'a, B> {
    /// Scope over the currently bound target
    pub fn current(backend: &'a mut B) -> Self {
        let saved = backend.render_target();
        Self { backend, saved }
    }

    /// Save the current binding, then bind `binding`.
    ///
    /// If the bind fails the guard is dropped before returning, which
    /// restores the saved binding.
    pub fn bind(backend: &'a mut B, binding: TargetBinding) -> BackendResult<Self> {
        let mut scope = Self::current(backend);
        scope.backend.set_render_target(binding)?;
        Ok(scope)
    }

    /// Binding that will be restored
    pub fn saved(&self) -> TargetBinding {
        self.saved
    }
}

impl<B: GraphicsBackend + ?Sized> Deref for TargetScope<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.backend
    }
}

impl<B: GraphicsBackend + ?Sized> DerefMut for TargetScope<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.backend
    }
}

impl<B: GraphicsBackend + ?Sized> Drop for TargetScope<'_, B> {
    fn drop(&mut self) {
        if self.backend.render_target() == self.saved {
            return;
        }
        if let Err(e) = self.backend.set_render_target(self.saved) {
            log::warn!("Failed to restore render target {:?}: {}", self.saved, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::{RenderTargetDescriptor, TextureFormat};
    use crate::backend::RecordingBackend;

    fn offscreen(backend: &mut RecordingBackend) -> TargetBinding {
        let color = backend
            .create_render_target(&RenderTargetDescriptor {
                label: None,
                width: 64,
                height: 64,
                format: TextureFormat::R32Float,
            })
            .unwrap();
        let depth = backend.create_depth_surface(64, 64).unwrap();
        TargetBinding::offscreen(color, Some(depth))
    }

    #[test]
    fn restores_on_drop() {
        let mut backend = RecordingBackend::new(800, 600);
        let target = offscreen(&mut backend);
        backend.begin_frame().unwrap();

        {
            let scope = TargetScope::bind(&mut backend, target).unwrap();
            assert_eq!(scope.render_target(), target);
            assert_eq!(scope.saved(), TargetBinding::BACKBUFFER);
        }
        assert_eq!(backend.render_target(), TargetBinding::BACKBUFFER);
    }

    #[test]
    fn restores_after_error_return() {
        fn failing_pass(backend: &mut dyn GraphicsBackend, target: TargetBinding) -> BackendResult<()> {
            let mut scope = TargetScope::bind(backend, target)?;
            scope.clear([1.0; 4], 1.0)?;
            Err(crate::backend::BackendError::OutOfMemory)
        }

        let mut backend = RecordingBackend::new(800, 600);
        let target = offscreen(&mut backend);
        backend.begin_frame().unwrap();

        assert!(failing_pass(&mut backend, target).is_err());
        assert_eq!(backend.render_target(), TargetBinding::BACKBUFFER);
    }

    #[test]
    fn failed_bind_keeps_binding() {
        let mut backend = RecordingBackend::new(800, 600);
        let target = offscreen(&mut backend);
        backend.set_fail_offscreen_binds(true);
        backend.begin_frame().unwrap();

        assert!(TargetScope::bind(&mut backend, target).is_err());
        assert_eq!(backend.render_target(), TargetBinding::BACKBUFFER);
    }

    #[test]
    fn restores_during_unwind() {
        let mut backend = RecordingBackend::new(800, 600);
        let target = offscreen(&mut backend);
        backend.begin_frame().unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = TargetScope::bind(&mut backend, target).unwrap();
            panic!("pass panicked");
        }));
        assert!(result.is_err());
        assert_eq!(backend.render_target(), TargetBinding::BACKBUFFER);
    }
}
