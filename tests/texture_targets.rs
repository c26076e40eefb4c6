// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Native targets chosen for textures, and uploads addressed through them.

use descriptor_bridge::bindings::visible_to::TextureUsages;
use descriptor_bridge::bindings::{
    Extent3d, Origin3d, Texture, TextureDescriptor, TextureDimension, TextureTarget,
    TextureViewDescriptor, TextureViewDimension,
};
use descriptor_bridge::images::{Color, Operations, RenderPassColorAttachment, RenderPassDescriptor};
use descriptor_bridge::pixel_formats::TextureFormat;
use descriptor_bridge::{Device, DeviceConfig, Error, HeadlessContext, consts as gl};

use TextureDimension::{D1, D2, D3};
use TextureTarget::{CubeMap, Texture2D, Texture2DArray, Texture3D};

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn target_selection() {
    // (dimension, layers, array, cubemap) -> target
    let cases = [
        (D1, 1, false, false, Texture2D),
        (D2, 1, false, false, Texture2D),
        (D2, 1, true, false, Texture2DArray),
        (D2, 4, false, false, Texture2DArray),
        (D2, 6, false, true, CubeMap),
        (D2, 6, true, true, CubeMap),
        (D3, 1, false, false, Texture3D),
        (D3, 8, true, false, Texture3D),
        (D3, 6, false, true, Texture3D),
    ];
    for (dimension, layers, array, cubemap, expected) in cases {
        assert_eq!(
            TextureTarget::select(dimension, layers, array, cubemap),
            expected,
            "{dimension:?} x{layers} array={array} cubemap={cubemap}"
        );
    }
    assert_eq!(Texture2D.native(), gl::TEXTURE_2D);
    assert_eq!(Texture2DArray.native(), gl::TEXTURE_2D_ARRAY);
    assert_eq!(Texture3D.native(), gl::TEXTURE_3D);
    assert_eq!(CubeMap.native(), gl::TEXTURE_CUBE_MAP);
}

fn descriptor(
    dimension: TextureDimension,
    size: Extent3d,
    array: bool,
    cubemap: bool,
) -> TextureDescriptor<'static> {
    TextureDescriptor {
        label: None,
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension,
        format: TextureFormat::Rgba8Unorm,
        usage: TextureUsages::COPY_DST | TextureUsages::COPY_SRC | TextureUsages::TEXTURE_BINDING,
        array,
        cubemap,
    }
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn storage_call_matches_the_target() {
    let context = HeadlessContext::new();
    let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
    let cases = [
        (descriptor(D2, Extent3d::new(4, 4, 1), false, false), "tex_storage_2d", gl::TEXTURE_2D),
        (descriptor(D1, Extent3d::new(16, 1, 1), false, false), "tex_storage_2d", gl::TEXTURE_2D),
        (
            descriptor(D2, Extent3d::new(4, 4, 6), false, true),
            "tex_storage_2d",
            gl::TEXTURE_CUBE_MAP,
        ),
        (
            descriptor(D2, Extent3d::new(4, 4, 3), false, false),
            "tex_storage_3d",
            gl::TEXTURE_2D_ARRAY,
        ),
        (
            descriptor(D2, Extent3d::new(4, 4, 1), true, false),
            "tex_storage_3d",
            gl::TEXTURE_2D_ARRAY,
        ),
        (
            descriptor(D3, Extent3d::new(4, 4, 4), false, false),
            "tex_storage_3d",
            gl::TEXTURE_3D,
        ),
    ];
    for (descriptor, call, target) in cases {
        context.clear_calls();
        let texture = device.create_texture(&descriptor).unwrap();
        assert_eq!(texture.target().native(), target);
        let storage: Vec<_> = context
            .calls()
            .into_iter()
            .filter(|c| c.name.starts_with("tex_storage"))
            .collect();
        assert_eq!(storage.len(), 1, "{descriptor:?}");
        assert_eq!(storage[0].name, call, "{descriptor:?}");
        assert_eq!(storage[0].arg(0), target as i64, "{descriptor:?}");
        if call == "tex_storage_3d" {
            assert_eq!(storage[0].arg(5), descriptor.size.depth_or_array_layers as i64);
        }
    }
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn cube_maps_need_six_square_layers() {
    let device = Device::new(HeadlessContext::new(), DeviceConfig::default()).unwrap();
    for size in [Extent3d::new(4, 4, 5), Extent3d::new(4, 8, 6), Extent3d::new(4, 4, 1)] {
        let result = device.create_texture(&descriptor(D2, size, false, true));
        assert!(matches!(result, Err(Error::InvalidDescriptor(_))), "{size:?}");
    }
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn three_dimensional_textures_ignore_the_cubemap_flag() {
    let context = HeadlessContext::new();
    let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
    for depth in [4, 6] {
        context.clear_calls();
        let texture = device
            .create_texture(&descriptor(D3, Extent3d::new(4, 4, depth), true, true))
            .unwrap();
        assert_eq!(texture.target(), Texture3D);
        let storage = context
            .calls()
            .into_iter()
            .find(|c| c.name == "tex_storage_3d")
            .unwrap();
        assert_eq!(storage.arg(0), gl::TEXTURE_3D as i64);
        assert_eq!(storage.arg(5), depth as i64);
    }
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn invalid_sizes_and_mip_counts_are_rejected() {
    let device = Device::new(HeadlessContext::new(), DeviceConfig::default()).unwrap();
    let empty = descriptor(D2, Extent3d::new(0, 4, 1), false, false);
    assert!(matches!(
        device.create_texture(&empty),
        Err(Error::InvalidDescriptor(_))
    ));
    let tall_line = descriptor(D1, Extent3d::new(8, 2, 1), false, false);
    assert!(matches!(
        device.create_texture(&tall_line),
        Err(Error::InvalidDescriptor(_))
    ));
    let mut too_many_mips = descriptor(D2, Extent3d::new(8, 8, 1), false, false);
    too_many_mips.mip_level_count = 5;
    assert!(matches!(
        device.create_texture(&too_many_mips),
        Err(Error::InvalidDescriptor(_))
    ));
    too_many_mips.mip_level_count = 4;
    let texture = device.create_texture(&too_many_mips).unwrap();
    assert_eq!(texture.mip_extent(3), Extent3d::new(1, 1, 1));
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn default_views_follow_the_target() {
    let device = Device::new(HeadlessContext::new(), DeviceConfig::default()).unwrap();
    let cases = [
        (descriptor(D1, Extent3d::new(8, 1, 1), false, false), TextureViewDimension::D1, 1),
        (descriptor(D2, Extent3d::new(8, 8, 1), false, false), TextureViewDimension::D2, 1),
        (descriptor(D2, Extent3d::new(8, 8, 3), false, false), TextureViewDimension::D2Array, 3),
        (descriptor(D2, Extent3d::new(8, 8, 6), false, true), TextureViewDimension::Cube, 6),
        (descriptor(D3, Extent3d::new(8, 8, 8), false, false), TextureViewDimension::D3, 1),
    ];
    for (descriptor, dimension, layers) in cases {
        let texture = device.create_texture(&descriptor).unwrap();
        let view = texture.create_view(&TextureViewDescriptor::default()).unwrap();
        assert_eq!(view.dimension(), dimension);
        assert_eq!(view.array_layer_count(), layers);
    }
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn views_outside_the_texture_are_rejected() {
    let device = Device::new(HeadlessContext::new(), DeviceConfig::default()).unwrap();
    let texture = device
        .create_texture(&descriptor(D2, Extent3d::new(8, 8, 3), false, false))
        .unwrap();
    let past_layers = TextureViewDescriptor {
        base_array_layer: 2,
        array_layer_count: Some(2),
        ..TextureViewDescriptor::default()
    };
    assert!(matches!(
        texture.create_view(&past_layers),
        Err(Error::InvalidDescriptor(_))
    ));
    let past_mips = TextureViewDescriptor {
        base_mip_level: 1,
        ..TextureViewDescriptor::default()
    };
    assert!(matches!(
        texture.create_view(&past_mips),
        Err(Error::InvalidDescriptor(_))
    ));
    let reinterpreted = TextureViewDescriptor {
        format: Some(TextureFormat::R32Float),
        ..TextureViewDescriptor::default()
    };
    assert!(matches!(
        texture.create_view(&reinterpreted),
        Err(Error::InvalidDescriptor(_))
    ));
}

/// A 2x2 layer filled with `value`.
fn layer(value: u8) -> Vec<u8> {
    vec![value; 2 * 2 * 4]
}

fn read_layer(device: &Device, texture: &Texture, z: u32) -> Vec<u8> {
    test_executors::spin_on(device.queue().read_texture(
        texture,
        0,
        Origin3d { x: 0, y: 0, z },
        Extent3d::new(2, 2, 1),
    ))
    .unwrap()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn array_layers_upload_and_read_back_independently() {
    let context = HeadlessContext::new();
    let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
    let texture = device
        .create_texture(&descriptor(D2, Extent3d::new(2, 2, 3), false, false))
        .unwrap();
    let data = [layer(10), layer(20)].concat();
    context.clear_calls();
    device
        .queue()
        .write_texture(&texture, 0, Origin3d { x: 0, y: 0, z: 1 }, Extent3d::new(2, 2, 2), &data)
        .unwrap();
    let upload = context
        .calls()
        .into_iter()
        .find(|c| c.name == "tex_sub_image_3d")
        .unwrap();
    assert_eq!(upload.arg(0), gl::TEXTURE_2D_ARRAY as i64);
    // z, then depth
    assert_eq!((upload.arg(4), upload.arg(7)), (1, 2));

    assert_eq!(read_layer(&device, &texture, 0), layer(0));
    assert_eq!(read_layer(&device, &texture, 1), layer(10));
    assert_eq!(read_layer(&device, &texture, 2), layer(20));
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn cube_faces_upload_through_face_targets() {
    let context = HeadlessContext::new();
    let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
    let texture = device
        .create_texture(&descriptor(D2, Extent3d::new(2, 2, 6), false, true))
        .unwrap();
    context.clear_calls();
    device
        .queue()
        .write_texture(&texture, 0, Origin3d { x: 0, y: 0, z: 4 }, Extent3d::new(2, 2, 1), &layer(99))
        .unwrap();
    let faces: Vec<i64> = context
        .calls()
        .iter()
        .filter(|c| c.name == "tex_sub_image_2d")
        .map(|c| c.arg(0))
        .collect();
    assert_eq!(faces, vec![(gl::TEXTURE_CUBE_MAP_POSITIVE_X + 4) as i64]);

    assert_eq!(read_layer(&device, &texture, 4), layer(99));
    assert_eq!(read_layer(&device, &texture, 5), layer(0));
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn uploads_must_fit_the_mip_level() {
    let device = Device::new(HeadlessContext::new(), DeviceConfig::default()).unwrap();
    let texture = device
        .create_texture(&descriptor(D2, Extent3d::new(2, 2, 1), false, false))
        .unwrap();
    let queue = device.queue();
    assert!(matches!(
        queue.write_texture(&texture, 0, Origin3d { x: 1, y: 0, z: 0 }, Extent3d::new(2, 2, 1), &layer(1)),
        Err(Error::InvalidDescriptor(_))
    ));
    assert!(matches!(
        queue.write_texture(&texture, 0, Origin3d::default(), Extent3d::new(2, 2, 1), &[0; 4]),
        Err(Error::InvalidDescriptor(_))
    ));
    assert!(matches!(
        queue.write_texture(&texture, 1, Origin3d::default(), Extent3d::new(1, 1, 1), &[0; 4]),
        Err(Error::InvalidDescriptor(_))
    ));
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn destroyed_textures_are_released_once() {
    let context = HeadlessContext::new();
    let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
    let texture = device
        .create_texture(&descriptor(D2, Extent3d::new(2, 2, 1), false, false))
        .unwrap();
    let live = context.live_objects().textures;
    texture.destroy();
    texture.destroy();
    assert!(texture.is_destroyed());
    assert_eq!(context.live_objects().textures, live - 1);
    drop(texture);
    assert_eq!(context.live_objects().textures, live - 1);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn depth_slices_of_a_3d_texture_are_attachable() {
    let context = HeadlessContext::new();
    let device = Device::new(context.clone(), DeviceConfig::default()).unwrap();
    let mut volume = descriptor(D3, Extent3d::new(2, 2, 4), false, false);
    volume.usage |= TextureUsages::RENDER_ATTACHMENT;
    let texture = device.create_texture(&volume).unwrap();

    let slice = texture
        .create_view(&TextureViewDescriptor {
            dimension: Some(TextureViewDimension::D2),
            base_array_layer: 2,
            ..TextureViewDescriptor::default()
        })
        .unwrap();
    assert_eq!(slice.dimension(), TextureViewDimension::D2);
    assert_eq!((slice.base_array_layer(), slice.array_layer_count()), (2, 1));
    assert_eq!(slice.mip_level_count(), 1);

    let mut encoder = device.create_command_encoder(None);
    {
        let _pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &slice,
                resolve_target: None,
                ops: Operations::clear(Color::WHITE),
            })],
            depth_stencil_attachment: None,
        });
    }
    context.clear_calls();
    device.queue().submit([encoder.finish().unwrap()]).unwrap();
    let attach = context
        .calls()
        .into_iter()
        .find(|c| c.name == "framebuffer_texture_layer")
        .unwrap();
    // level, then layer
    assert_eq!((attach.arg(3), attach.arg(4)), (0, 2));

    assert_eq!(read_layer(&device, &texture, 2), layer(255));
    assert_eq!(read_layer(&device, &texture, 1), layer(0));

    for bad in [
        TextureViewDescriptor {
            dimension: Some(TextureViewDimension::D2),
            base_array_layer: 4,
            ..TextureViewDescriptor::default()
        },
        TextureViewDescriptor {
            dimension: Some(TextureViewDimension::D2),
            array_layer_count: Some(2),
            ..TextureViewDescriptor::default()
        },
    ] {
        assert!(matches!(
            texture.create_view(&bad),
            Err(Error::InvalidDescriptor(_))
        ));
    }
}
