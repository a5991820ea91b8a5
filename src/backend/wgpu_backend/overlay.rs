//! Debug text overlay drawn with egui on top of the finished frame

use egui_wgpu::ScreenDescriptor;

use crate::backend::types::TextOverlay;

/// egui context plus renderer, used only to paint one static label
pub(crate) struct TextOverlayRenderer {
    ctx: egui::Context,
    renderer: egui_wgpu::Renderer,
}

impl TextOverlayRenderer {
    pub(crate) fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        Self {
            ctx: egui::Context::default(),
            renderer: egui_wgpu::Renderer::new(device, format, None, 1),
        }
    }

    /// Paint `overlay` into `view`, preserving what is already there
    pub(crate) fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        (width, height): (u32, u32),
        overlay: &TextOverlay,
    ) {
        let raw_input = egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(width as f32, height as f32),
            )),
            ..Default::default()
        };

        let [r, g, b, a] = overlay.color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        let color = egui::Color32::from_rgba_unmultiplied(r, g, b, a);

        let full_output = self.ctx.run(raw_input, |ctx| {
            egui::Area::new(egui::Id::new("debug_overlay"))
                .fixed_pos(egui::pos2(overlay.position[0], overlay.position[1]))
                .show(ctx, |ui| {
                    ui.label(
                        egui::RichText::new(overlay.text.as_str())
                            .color(color)
                            .size(overlay.size)
                            .strong(),
                    );
                });
        });

        let paint_jobs = self
            .ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }
        self.renderer
            .update_buffers(device, queue, encoder, &paint_jobs, &screen_descriptor);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Overlay Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer
                .render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
