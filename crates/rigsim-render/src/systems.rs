//! Camera capture system.

use bevy::prelude::*;

use rigsim_core::config::SimConfig;
use rigsim_core::time::Scheduler;
use rigsim_physics::context::RapierContext;

use crate::buffer::{DepthFrameBuffer, FrameBuffer};
use crate::camera::SimCamera;
use crate::config::RenderSettings;
use crate::lighting::Lighting;
use crate::raycast::render_frame;
use crate::scene::{PlacedShape, SceneVisuals};

/// Move an attached camera to its link. Returns `false` when the link is not
/// part of any robot; the camera then keeps its previous pose and the problem
/// is logged once.
pub fn follow_attachment(camera: &mut SimCamera, context: &RapierContext) -> bool {
    let name = camera.name.clone();
    let Some(attachment) = camera.attachment_mut() else {
        return true;
    };
    let Some(link_pose) = context.find_link(&attachment.link) else {
        if !attachment.missing_reported {
            warn!(
                "Camera '{name}' is attached to unknown link '{}'",
                attachment.link
            );
            attachment.missing_reported = true;
        }
        return false;
    };
    attachment.missing_reported = false;
    let pose = link_pose * attachment.offset;
    camera.set_pose(pose);
    true
}

/// Render every active camera whose frequency fires on this step.
#[allow(clippy::needless_pass_by_value)]
pub fn camera_capture_system(
    settings: Res<RenderSettings>,
    scheduler: Res<Scheduler>,
    config: Res<SimConfig>,
    context: Res<RapierContext>,
    visuals: Res<SceneVisuals>,
    lighting: Res<Lighting>,
    mut cameras: Query<(&mut SimCamera, &mut FrameBuffer, &mut DepthFrameBuffer)>,
) {
    if !settings.enabled {
        return;
    }

    // Shapes are placed at most once per step, and only if some camera fires.
    let mut placed: Option<Vec<PlacedShape<'_>>> = None;

    for (mut camera, mut frame, mut depth) in &mut cameras {
        let freq = camera.frequency.unwrap_or(config.graphics_freq);
        if !camera.active || !scheduler.schedule(freq) {
            continue;
        }
        follow_attachment(&mut camera, &context);

        let intrinsics = camera.intrinsics;
        if frame.width() != intrinsics.width || frame.height() != intrinsics.height {
            *frame = FrameBuffer::new(intrinsics.width, intrinsics.height, frame.format());
        }
        let shapes = placed.get_or_insert_with(|| visuals.place(&context));
        let rendered = render_frame(&camera, shapes, &lighting, frame.format());
        frame.write_frame(rendered.color);

        if camera.record_depth {
            if depth.width() != intrinsics.width || depth.height() != intrinsics.height {
                *depth = DepthFrameBuffer::for_camera(&intrinsics);
            }
            depth.write_depth_frame(rendered.depth);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
