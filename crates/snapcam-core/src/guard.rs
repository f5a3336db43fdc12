//! Scoped patching of shared rendering state around an offscreen render.
//!
//! [`SceneCaptureGuard`] disables stereo, hides the HUD, normalizes the
//! viewer's head scale and detaches the post-render hook for as long as it
//! lives. Dropping it restores exactly the values it captured, whether the
//! guarded action returned normally, returned an error or panicked.

use std::ops::{Deref, DerefMut};

use glam::Vec3;

/// Shared rendering state that an offscreen pass must patch.
///
/// Implemented by the host scene. Accessors return `None` for objects the
/// scene does not have (no viewer head, no HUD); the guard leaves those alone.
pub trait RenderContext {
    /// Viewer-specific callback that runs after every scene render.
    type PostRenderHook;

    fn stereo_enabled(&self) -> bool;

    fn set_stereo_enabled(&mut self, enabled: bool);

    fn hud_visible(&self) -> Option<bool>;

    fn set_hud_visible(&mut self, visible: bool);

    fn head_scale(&self) -> Option<Vec3>;

    fn set_head_scale(&mut self, scale: Vec3);

    /// Propagate the head's local transform into its world matrices.
    fn update_head_world_transform(&mut self);

    /// Detach the post-render hook, if any.
    fn take_post_render_hook(&mut self) -> Option<Self::PostRenderHook>;

    /// Reattach a hook previously returned by `take_post_render_hook`.
    fn restore_post_render_hook(&mut self, hook: Option<Self::PostRenderHook>);
}

/// Shared state captured immediately before a guarded render.
#[derive(Debug)]
pub struct CaptureGuardSnapshot<H> {
    pub stereo_enabled: bool,
    pub hud_visible: Option<bool>,
    pub head_scale: Option<Vec3>,
    pub post_render_hook: Option<H>,
}

/// RAII guard over a [`RenderContext`]. Dereferences to the patched context.
pub struct SceneCaptureGuard<'a, C: RenderContext> {
    ctx: &'a mut C,
    saved: Option<CaptureGuardSnapshot<C::PostRenderHook>>,
}

impl<'a, C: RenderContext> SceneCaptureGuard<'a, C> {
    /// Capture the current shared state and patch it for an offscreen pass.
    pub fn acquire(ctx: &'a mut C) -> Self {
        let saved = CaptureGuardSnapshot {
            stereo_enabled: ctx.stereo_enabled(),
            hud_visible: ctx.hud_visible(),
            head_scale: ctx.head_scale(),
            post_render_hook: ctx.take_post_render_hook(),
        };

        ctx.set_stereo_enabled(false);
        if saved.hud_visible.is_some() {
            ctx.set_hud_visible(false);
        }
        if saved.head_scale.is_some() {
            ctx.set_head_scale(Vec3::ONE);
            ctx.update_head_world_transform();
        }

        Self {
            ctx,
            saved: Some(saved),
        }
    }

    /// The values that will be restored on drop.
    pub fn snapshot(&self) -> Option<&CaptureGuardSnapshot<C::PostRenderHook>> {
        self.saved.as_ref()
    }
}

impl<C: RenderContext> Deref for SceneCaptureGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &*self.ctx
    }
}

impl<C: RenderContext> DerefMut for SceneCaptureGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut *self.ctx
    }
}

impl<C: RenderContext> Drop for SceneCaptureGuard<'_, C> {
    fn drop(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        self.ctx.set_stereo_enabled(saved.stereo_enabled);
        self.ctx.restore_post_render_hook(saved.post_render_hook);
        if let Some(scale) = saved.head_scale {
            self.ctx.set_head_scale(scale);
            self.ctx.update_head_world_transform();
        }
        if let Some(visible) = saved.hud_visible {
            self.ctx.set_hud_visible(visible);
        }
    }
}

/// Run `action` with the shared state patched for an offscreen render and
/// restore it afterwards.
pub fn with_guarded_render<C, R>(ctx: &mut C, action: impl FnOnce(&mut C) -> R) -> R
where
    C: RenderContext,
{
    let mut guard = SceneCaptureGuard::acquire(ctx);
    action(&mut *guard)
}
