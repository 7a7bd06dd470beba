//! librga (im2d) backed scaler.
//!
//! Binds the C entry points of the im2d API from librga 1.9.x. The C++
//! convenience overloads (`imcheck`, `imresize`) are thin inlines over the
//! `_t` functions called here with their default arguments.
//!
//! # Safety
//!
//! Buffers are imported by virtual address for the duration of a single
//! call and released before returning, so no handle outlives the borrow it
//! was created from.

#![allow(non_camel_case_types, dead_code)]

use std::ffi::c_void;
use std::os::raw::{c_double, c_int};

use super::{validate_pair, ImageScaler, PixelFormat, SourceImage, TargetImage};
use crate::error::AcceleratorError;

type rga_buffer_handle_t = c_int;
type IM_STATUS = c_int;

const IM_STATUS_SUCCESS: IM_STATUS = 1;
const IM_STATUS_NOERROR: IM_STATUS = 2;

const RK_FORMAT_RGBA_8888: c_int = 0x0 << 8;
const RK_FORMAT_RGB_888: c_int = 0x2 << 8;

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct im_rect {
    x: c_int,
    y: c_int,
    width: c_int,
    height: c_int,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct im_colorkey_range {
    max: c_int,
    min: c_int,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct im_nn_t {
    scale_r: c_int,
    scale_g: c_int,
    scale_b: c_int,
    offset_r: c_int,
    offset_g: c_int,
    offset_b: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct rga_buffer_t {
    vir_addr: *mut c_void,
    phy_addr: *mut c_void,
    fd: c_int,
    width: c_int,
    height: c_int,
    wstride: c_int,
    hstride: c_int,
    format: c_int,
    color_space_mode: c_int,
    global_alpha: c_int,
    rd_mode: c_int,
    color: c_int,
    colorkey_range: im_colorkey_range,
    nn: im_nn_t,
    rop_code: c_int,
    handle: rga_buffer_handle_t,
}

extern "C" {
    fn importbuffer_virtualaddr(va: *mut c_void, size: c_int) -> rga_buffer_handle_t;
    fn releasebuffer_handle(handle: rga_buffer_handle_t) -> IM_STATUS;
    fn wrapbuffer_handle_t(
        handle: rga_buffer_handle_t,
        width: c_int,
        height: c_int,
        wstride: c_int,
        hstride: c_int,
        format: c_int,
    ) -> rga_buffer_t;
    fn imcheck_t(
        src: rga_buffer_t,
        dst: rga_buffer_t,
        pat: rga_buffer_t,
        src_rect: im_rect,
        dst_rect: im_rect,
        pat_rect: im_rect,
        mode_usage: c_int,
    ) -> IM_STATUS;
    fn imresize_t(
        src: rga_buffer_t,
        dst: rga_buffer_t,
        fx: c_double,
        fy: c_double,
        interpolation: c_int,
        sync: c_int,
        release_fence_fd: *mut c_int,
    ) -> IM_STATUS;
}

fn rk_format(format: PixelFormat) -> c_int {
    match format {
        PixelFormat::Rgba8888 => RK_FORMAT_RGBA_8888,
        PixelFormat::Rgb888 => RK_FORMAT_RGB_888,
    }
}

/// Imported source/destination pair, released on drop.
struct ImportedPair {
    src_handle: rga_buffer_handle_t,
    dst_handle: rga_buffer_handle_t,
    src: rga_buffer_t,
    dst: rga_buffer_t,
}

impl ImportedPair {
    fn import(src: &SourceImage<'_>, dst: &TargetImage<'_>) -> Result<Self, AcceleratorError> {
        // librga only reads through the source address
        let src_ptr = src.data.as_ptr() as *mut c_void;
        let dst_ptr = dst.data.as_ptr() as *mut c_void;

        // SAFETY: both slices stay borrowed for the lifetime of the pair.
        let src_handle = unsafe { importbuffer_virtualaddr(src_ptr, src.desc.min_len() as c_int) };
        let dst_handle = unsafe { importbuffer_virtualaddr(dst_ptr, dst.desc.min_len() as c_int) };

        if src_handle == 0 || dst_handle == 0 {
            // SAFETY: only non-zero handles were imported.
            unsafe {
                if src_handle != 0 {
                    releasebuffer_handle(src_handle);
                }
                if dst_handle != 0 {
                    releasebuffer_handle(dst_handle);
                }
            }
            return Err(AcceleratorError::Scaler {
                call: "importbuffer_virtualaddr",
                status: 0,
            });
        }

        let wrap = |handle, desc: &super::ImageDesc| unsafe {
            wrapbuffer_handle_t(
                handle,
                desc.width as c_int,
                desc.height as c_int,
                (desc.stride / desc.format.bytes_per_pixel()) as c_int,
                desc.height as c_int,
                rk_format(desc.format),
            )
        };

        Ok(Self {
            src_handle,
            dst_handle,
            src: wrap(src_handle, &src.desc),
            dst: wrap(dst_handle, &dst.desc),
        })
    }
}

impl Drop for ImportedPair {
    fn drop(&mut self) {
        // SAFETY: handles came from importbuffer_virtualaddr and are released once.
        unsafe {
            releasebuffer_handle(self.src_handle);
            releasebuffer_handle(self.dst_handle);
        }
    }
}

/// Hardware resize + RGBA→RGB conversion through the RGA block
#[derive(Default)]
pub struct RgaScaler;

impl RgaScaler {
    pub fn new() -> Self {
        Self
    }
}

impl ImageScaler for RgaScaler {
    fn check(&self, src: &SourceImage<'_>, dst: &TargetImage<'_>) -> Result<(), AcceleratorError> {
        validate_pair(src, dst)?;
        let pair = ImportedPair::import(src, dst)?;
        let empty = rga_buffer_t {
            vir_addr: std::ptr::null_mut(),
            phy_addr: std::ptr::null_mut(),
            fd: 0,
            width: 0,
            height: 0,
            wstride: 0,
            hstride: 0,
            format: 0,
            color_space_mode: 0,
            global_alpha: 0,
            rd_mode: 0,
            color: 0,
            colorkey_range: im_colorkey_range::default(),
            nn: im_nn_t::default(),
            rop_code: 0,
            handle: 0,
        };
        let rect = im_rect::default();

        // SAFETY: the pair holds live imports of both buffers.
        let status = unsafe { imcheck_t(pair.src, pair.dst, empty, rect, rect, rect, 0) };
        if status != IM_STATUS_NOERROR {
            return Err(AcceleratorError::Scaler {
                call: "imcheck",
                status,
            });
        }
        Ok(())
    }

    fn resize(
        &mut self,
        src: &SourceImage<'_>,
        dst: &mut TargetImage<'_>,
    ) -> Result<(), AcceleratorError> {
        let pair = ImportedPair::import(src, dst)?;

        // SAFETY: synchronous call; buffers are not touched after it returns.
        let status =
            unsafe { imresize_t(pair.src, pair.dst, 0.0, 0.0, 0, 1, std::ptr::null_mut()) };
        if status != IM_STATUS_SUCCESS {
            return Err(AcceleratorError::Scaler {
                call: "imresize",
                status,
            });
        }
        Ok(())
    }
}
