//! Scalar conversions shared by the record parsers and the mesh builder.
//!
//! Geometry is stored as signed 16.16 fixed point in a right-handed,
//! Z-up file space. Everything handed to callers is `f32` in the render
//! space `(-y, z, x)`.

use glam::{Vec2, Vec3};

/// `1.0` in 16.16 fixed point.
pub const FIXED_ONE: i32 = 1 << 16;

#[inline]
pub fn fixed_to_f32(v: i32) -> f32 {
    v as f32 / FIXED_ONE as f32
}

/// Three fixed-point components, file axes preserved.
#[inline]
pub fn fixed_vec3(v: [i32; 3]) -> Vec3 {
    Vec3::new(fixed_to_f32(v[0]), fixed_to_f32(v[1]), fixed_to_f32(v[2]))
}

/// File space to render space.
#[inline]
pub fn pod_transform(v: Vec3) -> Vec3 {
    Vec3::new(-v.y, v.z, v.x)
}

/// A stored fixed-point triple straight into render space.
#[inline]
pub fn fixed_point(v: [i32; 3]) -> Vec3 {
    pod_transform(fixed_vec3(v))
}

/// Texture coordinates are stored as bytes widened to u32 (0..=255).
#[inline]
pub fn uv_from_raw(u: u32, v: u32) -> Vec2 {
    Vec2::new(u as f32 / 255.0, v as f32 / 255.0)
}

/// Expand one RGB565 pixel to opaque RGBA8.
pub fn rgb565_to_rgba8(pix: u16) -> [u8; 4] {
    let r5 = ((pix >> 11) & 0x1f) as u32;
    let g6 = ((pix >> 5) & 0x3f) as u32;
    let b5 = (pix & 0x1f) as u32;
    [
        ((r5 * 527 + 23) >> 6) as u8,
        ((g6 * 259 + 33) >> 6) as u8,
        ((b5 * 527 + 23) >> 6) as u8,
        0xff,
    ]
}

/// Expand a whole RGB565 page into a tightly packed RGBA8 buffer.
pub fn rgb565_page_to_rgba8(pixels: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * 4);
    for &p in pixels {
        out.extend_from_slice(&rgb565_to_rgba8(p));
    }
    out
}

/// Packed `0x00RRGGBB` face colour as a normalised diffuse value.
pub fn diffuse_from_packed(color: u32) -> Vec3 {
    Vec3::new(
        ((color >> 16) & 0xff) as f32 / 255.0,
        ((color >> 8) & 0xff) as f32 / 255.0,
        (color & 0xff) as f32 / 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed_point_scale() {
        assert_eq!(fixed_to_f32(FIXED_ONE), 1.0);
        assert_eq!(fixed_to_f32(-FIXED_ONE / 2), -0.5);
        assert_eq!(fixed_to_f32(0x0003_4000), 3.25);
    }

    #[test]
    fn transform_remaps_axes() {
        let v = pod_transform(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v, Vec3::new(-2.0, 3.0, 1.0));
    }

    #[test]
    fn rgb565_extremes() {
        assert_eq!(rgb565_to_rgba8(0xffff), [255, 255, 255, 255]);
        assert_eq!(rgb565_to_rgba8(0x0000), [0, 0, 0, 255]);
        assert_eq!(rgb565_to_rgba8(0xf800), [255, 0, 0, 255]);
        assert_eq!(rgb565_to_rgba8(0x07e0), [0, 255, 0, 255]);
        assert_eq!(rgb565_to_rgba8(0x001f), [0, 0, 255, 255]);
    }

    #[test]
    fn packed_colour() {
        let c = diffuse_from_packed(0x00ff_8000);
        assert_eq!(c.x, 1.0);
        assert!((c.y - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.z, 0.0);
    }

    proptest! {
        #[test]
        fn rgb565_channels_are_monotonic(r in 0u16..31, g in 0u16..63, b in 0u16..31) {
            let lo = rgb565_to_rgba8((r << 11) | (g << 5) | b);
            let hi = rgb565_to_rgba8(((r + 1) << 11) | ((g + 1) << 5) | (b + 1));
            prop_assert!(hi[0] > lo[0]);
            prop_assert!(hi[1] > lo[1]);
            prop_assert!(hi[2] > lo[2]);
        }
    }
}
