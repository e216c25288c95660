/// Host lifecycle hooks run around each camera's draw pass.
///
/// Hooks record into the camera's [`RenderCommands`] and may rebind the
/// render target, bind materials, push textures and draw. They run on the
/// per-camera worker threads, so implementations must be `Send + Sync`.
///
/// Per camera the order is: `pre_shadow`, `post_shadow`, `pre_render`,
/// render stacks, `post_render`, `light_setup`, then for each light kind
/// with lights on the camera's layers `pre_light` / light draws /
/// `post_light`, and finally `post_process`.

use crate::error::Result;
use crate::frame::RenderCommands;
use crate::handles::ProgramHandle;
use crate::scene::LightKind;

#[allow(unused_variables)]
pub trait RenderHooks: Send + Sync {
    fn pre_shadow(&self, commands: &mut RenderCommands) -> Result<()> {
        Ok(())
    }

    fn post_shadow(&self, commands: &mut RenderCommands) -> Result<()> {
        Ok(())
    }

    fn pre_render(&self, commands: &mut RenderCommands) -> Result<()> {
        Ok(())
    }

    fn post_render(&self, commands: &mut RenderCommands) -> Result<()> {
        Ok(())
    }

    /// Runs once before the light passes
    fn light_setup(&self, commands: &mut RenderCommands) -> Result<()> {
        Ok(())
    }

    /// Material drawing every light of `kind`; `None` skips the kind
    fn pre_light(&self, kind: LightKind, commands: &mut RenderCommands) -> Result<Option<ProgramHandle>> {
        Ok(None)
    }

    fn post_light(&self, kind: LightKind, commands: &mut RenderCommands) -> Result<()> {
        Ok(())
    }

    fn post_process(&self, commands: &mut RenderCommands) -> Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing: cameras only draw their render stacks
pub struct NoHooks;

impl RenderHooks for NoHooks {}
