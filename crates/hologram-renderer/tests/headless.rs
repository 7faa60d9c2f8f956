//! Smoke tests against a real adapter. Each test returns early when the
//! machine has none.

use glam::Vec3;
use hologram_renderer::camera::Camera;
use hologram_renderer::renderer::context::Gpu;
use hologram_renderer::renderer::pipelines::interpolation::InterpolationFrame;
use hologram_renderer::renderer::pipelines::lenticular::LenticularPass;
use hologram_renderer::renderer::targets::QuiltTargets;
use hologram_renderer::renderer::{PostProcess, QuiltRenderer};
use hologram_renderer::scene::{CubeInstance, DemoScene, EmptyScene};
use quilt::{
    Calibration, DebugView, DisplayRegion, InterpolationMode, InterpolationPlan, Lens, QuiltLayout,
    RenderSettings,
};

fn gpu() -> Option<Gpu> {
    match pollster::block_on(Gpu::headless()) {
        Ok(Some(gpu)) => Some(gpu),
        Ok(None) => {
            eprintln!("no GPU adapter; skipping");
            None
        }
        Err(err) => {
            eprintln!("GPU device unavailable ({err:#}); skipping");
            None
        }
    }
}

fn settings(layout: QuiltLayout) -> RenderSettings {
    RenderSettings {
        quilt_override: Some(layout),
        ..RenderSettings::default()
    }
}

fn renderer(gpu: &Gpu, calibration: Calibration, settings: RenderSettings) -> QuiltRenderer {
    QuiltRenderer::new(&gpu.device, calibration, settings).expect("quilt pipelines")
}

/// Looks straight down -Z at the origin, so the focal plane is z = 0.
fn level_camera() -> Camera {
    let mut camera = Camera::new(Lens::default(), 1.0);
    camera.pitch_rad = 0.0;
    camera.update();
    camera
}

fn assert_no_validation_errors(gpu: &Gpu) {
    let err = pollster::block_on(gpu.device.pop_error_scope());
    assert!(err.is_none(), "validation error: {err:?}");
}

/// `rows` rows of a 4-byte-per-texel texture starting at row `y`. `width * 4`
/// must be a multiple of 256.
fn read_rows(gpu: &Gpu, texture: &wgpu::Texture, width: u32, y: u32, rows: u32) -> Vec<u8> {
    let bytes_per_row = width * 4;
    assert_eq!(bytes_per_row % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);

    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback"),
        size: (bytes_per_row * rows) as u64,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x: 0, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(rows),
            },
        },
        wgpu::Extent3d {
            width,
            height: rows,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |_| ());
    gpu.device.poll(wgpu::Maintain::Wait);
    let bytes = slice.get_mapped_range().to_vec();
    buffer.unmap();
    bytes
}

fn read_color(gpu: &Gpu, quilt: &QuiltTargets) -> Vec<u8> {
    read_rows(gpu, &quilt.color_texture, quilt.width, 0, quilt.height)
}

fn read_depth(gpu: &Gpu, quilt: &QuiltTargets) -> Vec<f32> {
    read_rows(gpu, &quilt.depth_texture, quilt.width, 0, quilt.height)
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// RGBA texels of one view's tile, row by row.
fn tile_texels(color: &[u8], quilt_width: u32, layout: &QuiltLayout, view_index: u32) -> Vec<[u8; 4]> {
    let rect = layout.tile_rect(view_index);
    let mut out = Vec::with_capacity((rect.width * rect.height) as usize);
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            let at = ((y * quilt_width + x) * 4) as usize;
            out.push([color[at], color[at + 1], color[at + 2], color[at + 3]]);
        }
    }
    out
}

fn tile_depths(depth: &[f32], quilt_width: u32, layout: &QuiltLayout, view_index: u32) -> Vec<f32> {
    let rect = layout.tile_rect(view_index);
    (rect.y..rect.y + rect.height)
        .flat_map(|y| (rect.x..rect.x + rect.width).map(move |x| depth[(y * quilt_width + x) as usize]))
        .collect()
}

fn mismatches(a: &[[u8; 4]], b: &[[u8; 4]]) -> usize {
    a.iter()
        .zip(b)
        .filter(|(pa, pb)| pa.iter().zip(pb.iter()).any(|(x, y)| x.abs_diff(*y) > 10))
        .count()
}

#[test]
fn every_other_renders_nine_of_sixteen() {
    let Some(gpu) = gpu() else { return };
    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let mut s = settings(QuiltLayout::new(512, 512, 4, 4, 1.0));
    s.interpolation = InterpolationMode::EveryOther;
    let mut renderer = renderer(&gpu, Calibration::default(), s);
    let mut camera = Camera::new(Lens::default(), 1.0);
    let mut scene = DemoScene::new(&gpu.device);

    assert!(renderer.quilt().is_none());
    let report = renderer.render(&gpu.device, &gpu.queue, &mut camera, &mut scene, None);
    gpu.device.poll(wgpu::Maintain::Wait);

    assert_eq!(report.rendered, 9);
    assert_eq!(report.skipped, 7);
    // Zero only when the device rejected the compute shader.
    assert!(report.interpolated == 7 || report.interpolated == 0);
    assert!(!report.degenerate);
    assert!(renderer.quilt().is_some());
    assert_no_validation_errors(&gpu);
}

#[test]
fn interpolated_tiles_match_neighbours_on_the_focal_plane() {
    let Some(gpu) = gpu() else { return };

    // Two thin slabs lying on the focal plane look the same from every view.
    let instances = vec![
        CubeInstance::new(Vec3::new(-1.2, 0.0, 0.0), Vec3::new(1.0, 3.0, 0.01), [0.9, 0.2, 0.1, 1.0]),
        CubeInstance::new(Vec3::new(1.2, 0.0, 0.0), Vec3::new(1.0, 3.0, 0.01), [0.1, 0.3, 0.9, 1.0]),
    ];

    // Every4th with flicker reduction chains views 1..3 off each other.
    for (mode, reduce_flicker) in [(InterpolationMode::EveryOther, false), (InterpolationMode::Every4th, true)] {
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let layout = QuiltLayout::new(512, 512, 4, 4, 1.0);
        let plan = InterpolationPlan::build(&layout, mode, Calibration::default().view_cone);
        let mut s = settings(layout);
        s.interpolation = mode;
        s.reduce_flicker = reduce_flicker;
        let mut renderer = renderer(&gpu, Calibration::default(), s);
        let mut camera = level_camera();
        let mut scene = DemoScene::with_instances(&gpu.device, instances.clone());

        let report = renderer.render(&gpu.device, &gpu.queue, &mut camera, &mut scene, None);
        if report.interpolated == 0 {
            eprintln!("interpolation unavailable on this adapter; skipping");
            return;
        }
        assert_eq!(report.interpolated, plan.interpolated_count());

        let Some(quilt) = renderer.quilt() else {
            panic!("quilt not ready after a frame");
        };
        let color = read_color(&gpu, quilt);
        let tile_pixels = (layout.tile_width() * layout.tile_height()) as usize;

        for v in &plan.views {
            let view = v.view_index;
            let synthesized = tile_texels(&color, quilt.width, &layout, view);
            let opaque = synthesized.iter().filter(|p| p[3] > 200).count();
            assert!(opaque > tile_pixels / 10, "view {view} is mostly empty ({opaque} opaque)");

            for base in [v.prev_base, v.next_base] {
                let rendered = tile_texels(&color, quilt.width, &layout, base);
                let off = mismatches(&synthesized, &rendered);
                assert!(
                    off <= tile_pixels / 100,
                    "{mode}: view {view} differs from view {base} in {off} texels"
                );
            }
        }
        assert_no_validation_errors(&gpu);
    }
}

#[test]
fn gap_fill_closes_holes() {
    let Some(gpu) = gpu() else { return };

    let layout = QuiltLayout::new(512, 512, 4, 4, 1.0);
    let lens = Lens::default();
    let focal = lens.distance();

    // View 4 sits halfway between bases 0 and 8. Pick a cone that shifts the
    // far background by about 60% of a tile in each direction, so the middle
    // of the tile is out of reach of both bases.
    let shift = |cone: f32| {
        let frame = InterpolationFrame {
            focal,
            size: lens.size,
            aspect: layout.render_aspect(),
            view_cone_deg: cone,
            blend_views: true,
            reduce_flicker: false,
            fill_gaps: true,
        };
        let plan = InterpolationPlan::build(&layout, InterpolationMode::Every8th, cone);
        let view = plan
            .views
            .iter()
            .find(|v| v.view_index == 4)
            .expect("view 4 is interpolated");
        (view.lerp * view.parallax_offset * frame.depth_scale() * (focal / lens.far() - 1.0)).abs()
    };
    let cone = (10..179)
        .map(|half_deg| half_deg as f32 * 0.5)
        .find(|&cone| (0.55..0.65).contains(&shift(cone)))
        .expect("some cone opens a hole in view 4");

    let calibration = Calibration {
        view_cone: cone,
        ..Calibration::default()
    };

    let mut holes = Vec::new();
    for fill_gaps in [false, true] {
        gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut s = settings(layout);
        s.interpolation = InterpolationMode::Every8th;
        s.fill_gaps = fill_gaps;
        let mut renderer = renderer(&gpu, calibration.clone(), s);
        let mut camera = level_camera();

        let report = renderer.render(&gpu.device, &gpu.queue, &mut camera, &mut EmptyScene, None);
        if report.interpolated == 0 {
            eprintln!("interpolation unavailable on this adapter; skipping");
            return;
        }

        let Some(quilt) = renderer.quilt() else {
            panic!("quilt not ready after a frame");
        };
        let depth = read_depth(&gpu, quilt);
        let in_view_4 = tile_depths(&depth, quilt.width, &layout, 4)
            .iter()
            .filter(|d| **d < 0.0)
            .count();
        let anywhere = depth.iter().filter(|d| **d < 0.0).count();
        holes.push((in_view_4, anywhere));
        assert_no_validation_errors(&gpu);
    }

    assert!(holes[0].0 > 0, "no hole to fill: {holes:?}");
    assert_eq!(holes[1].1, 0, "holes left after filling: {holes:?}");
}

#[test]
fn debug_view_fast_copies_into_every_tile() {
    let Some(gpu) = gpu() else { return };
    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let mut s = settings(QuiltLayout::new(512, 512, 4, 4, 1.0));
    s.interpolation = InterpolationMode::EveryOther;
    s.debug_view = Some(DebugView {
        view_index: 5,
        fast_copy: true,
    });
    let mut renderer = renderer(&gpu, Calibration::default(), s);
    let mut camera = Camera::new(Lens::default(), 1.0);
    let mut scene = DemoScene::new(&gpu.device);

    let report = renderer.render(&gpu.device, &gpu.queue, &mut camera, &mut scene, None);
    gpu.device.poll(wgpu::Maintain::Wait);

    assert_eq!(report.rendered, 1);
    assert_eq!(report.copied, 15);
    assert_eq!(report.interpolated, 0);
    assert_no_validation_errors(&gpu);
}

#[test]
fn uninitialized_camera_skips_the_frame() {
    let Some(gpu) = gpu() else { return };
    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let mut renderer = renderer(
        &gpu,
        Calibration::default(),
        settings(QuiltLayout::new(256, 256, 2, 2, 1.0)),
    );
    let mut camera = Camera::new(
        Lens {
            fov_deg: 0.0,
            ..Lens::default()
        },
        1.0,
    );
    assert!(!camera.is_initialized());

    let report = renderer.render(&gpu.device, &gpu.queue, &mut camera, &mut EmptyScene, None);

    assert!(report.frame_skipped);
    assert_eq!(report.rendered, 0);
    assert!(renderer.quilt().is_none());
    assert_no_validation_errors(&gpu);
}

#[test]
fn zero_view_cone_still_completes() {
    let Some(gpu) = gpu() else { return };
    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let calibration = Calibration {
        view_cone: 0.0,
        ..Calibration::default()
    };
    let mut renderer = renderer(&gpu, calibration, settings(QuiltLayout::new(256, 256, 2, 2, 1.0)));
    let mut camera = Camera::new(Lens::default(), 1.0);
    let mut scene = DemoScene::new(&gpu.device);

    let report = renderer.render(&gpu.device, &gpu.queue, &mut camera, &mut scene, None);

    assert!(report.degenerate);
    assert!(!report.frame_skipped);
    assert_eq!(report.rendered, 4);
    assert!(renderer.quilt().is_some());
    assert_no_validation_errors(&gpu);
}

/// Overwrites the whole quilt, alpha included, with opaque red.
struct FillRed;

impl PostProcess for FillRed {
    fn process(
        &mut self,
        _device: &wgpu::Device,
        _queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        quilt: &QuiltTargets,
    ) {
        let _ = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Fill Red"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &quilt.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::RED),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
}

#[test]
fn post_process_keeps_quilt_alpha() {
    let Some(gpu) = gpu() else { return };
    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let mut s = settings(QuiltLayout::new(256, 256, 1, 1, 1.0));
    s.post_processing = true;
    let mut renderer = renderer(&gpu, Calibration::default(), s);
    let mut camera = Camera::new(Lens::default(), 1.0);
    let mut post = FillRed;

    // The alpha snapshot is taken fresh every frame.
    for _ in 0..2 {
        renderer.render(&gpu.device, &gpu.queue, &mut camera, &mut EmptyScene, Some(&mut post));
        let Some(quilt) = renderer.quilt() else {
            panic!("quilt not ready after a frame");
        };
        let row = read_rows(&gpu, &quilt.color_texture, quilt.width, 0, 1);

        for px in row.chunks_exact(4) {
            assert_eq!(px, [255, 0, 0, 0]);
        }
    }
    assert_no_validation_errors(&gpu);
}

#[test]
fn display_is_black_without_a_quilt() {
    let Some(gpu) = gpu() else { return };
    gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);

    let format = wgpu::TextureFormat::Rgba8Unorm;
    let target = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Display"),
        size: wgpu::Extent3d {
            width: 64,
            height: 64,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let renderer = renderer(&gpu, Calibration::default(), RenderSettings::default());
    let region = DisplayRegion::new(64.0, 64.0);
    let params = renderer.lenticular_params(&region);
    let mut pass = LenticularPass::new(&gpu.device, format);

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    pass.draw(&gpu.device, &gpu.queue, &mut encoder, &view, renderer.quilt(), &params, &region);
    gpu.queue.submit(Some(encoder.finish()));

    let row = read_rows(&gpu, &target, 64, 0, 1);
    for px in row.chunks_exact(4) {
        assert_eq!(px, [0, 0, 0, 255]);
    }
    assert_no_validation_errors(&gpu);
}
