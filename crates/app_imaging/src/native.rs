//! Native float-RGBA decoder libraries
//!
//! Each native codec exports a two-function C ABI:
//!
//! ```c
//! bool load_<kind>_rgba(const char *path, float **pixels, int *width, int *height);
//! void free_<kind>_pixels(float *pixels);
//! ```
//!
//! `load` hands out an RGBA f32 buffer owned by the library; it must be
//! returned through `free` exactly once. [`NativePixels`] owns such a buffer
//! and releases it on drop, so every exit path (including errors and
//! cancellation during conversion) gives it back.

use crate::error::NativeError;
use crate::format::ImageFormat;
use libloading::Library;
use std::ffi::{c_char, c_int, CString};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// `load_*_rgba` signature
pub type LoadFn =
    unsafe extern "C" fn(*const c_char, *mut *mut f32, *mut c_int, *mut c_int) -> bool;

/// `free_*_pixels` signature
pub type FreeFn = unsafe extern "C" fn(*mut f32);

/// Which native library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Hdr,
    Exr,
}

impl NativeKind {
    pub fn format(self) -> ImageFormat {
        match self {
            NativeKind::Hdr => ImageFormat::Hdr,
            NativeKind::Exr => ImageFormat::Exr,
        }
    }

    /// Platform file name, e.g. `libhdr.so`
    pub fn library_file_name(self) -> String {
        let stem = match self {
            NativeKind::Hdr => "libhdr",
            NativeKind::Exr => "libexr",
        };

        if cfg!(windows) {
            format!("{}.dll", stem)
        } else if cfg!(target_os = "macos") {
            format!("{}.dylib", stem)
        } else {
            format!("{}.so", stem)
        }
    }

    fn load_symbol(self) -> &'static [u8] {
        match self {
            NativeKind::Hdr => b"load_hdr_rgba\0",
            NativeKind::Exr => b"load_exr_rgba\0",
        }
    }

    fn free_symbol(self) -> &'static [u8] {
        match self {
            NativeKind::Hdr => b"free_hdr_pixels\0",
            NativeKind::Exr => b"free_exr_pixels\0",
        }
    }
}

/// Bound native entry points for one library
pub struct NativeCodec {
    kind: NativeKind,
    load: LoadFn,
    free: FreeFn,
    // Keeps `load`/`free` valid for the codec's lifetime
    _library: Option<Library>,
}

impl NativeCodec {
    /// Load a codec library from an explicit path
    pub fn open(kind: NativeKind, path: &Path) -> Result<Self, NativeError> {
        unsafe {
            let library = Library::new(path)?;

            let load = *library.get::<LoadFn>(kind.load_symbol())?;
            let free = *library.get::<FreeFn>(kind.free_symbol())?;

            Ok(Self {
                kind,
                load,
                free,
                _library: Some(library),
            })
        }
    }

    /// Bind already-linked functions.
    ///
    /// # Safety
    /// `load` and `free` must honour the contract in the module docs: a
    /// `true` return yields a buffer of `width * height * 4` floats that
    /// stays valid until passed to `free`.
    pub unsafe fn from_fns(kind: NativeKind, load: LoadFn, free: FreeFn) -> Self {
        Self {
            kind,
            load,
            free,
            _library: None,
        }
    }

    /// Search the usual install locations for the platform library.
    ///
    /// Order: each of `extra_dirs`, `<exe dir>/lib/<OS>/`, `<exe dir>/`.
    pub fn discover(kind: NativeKind, extra_dirs: &[PathBuf]) -> Option<Self> {
        let file_name = kind.library_file_name();

        for candidate in search_paths(&file_name, extra_dirs) {
            if !candidate.is_file() {
                tracing::debug!("[NativeCodec] {} not found, trying next location", candidate.display());
                continue;
            }

            match Self::open(kind, &candidate) {
                Ok(codec) => {
                    tracing::info!("[NativeCodec] Loaded {:?} decoder from {}", kind, candidate.display());
                    return Some(codec);
                }
                Err(e) => {
                    tracing::warn!("[NativeCodec] Failed to load {}: {}", candidate.display(), e);
                }
            }
        }

        tracing::error!("[NativeCodec] Failed to locate {}; {} files will not decode", file_name, kind.format());
        None
    }

    pub fn kind(&self) -> NativeKind {
        self.kind
    }

    /// Decode `path` into a native float buffer.
    ///
    /// A `false` return or null buffer is a clean failure and `free` is not
    /// called. Once a buffer is received it is owned by the returned value
    /// (or released immediately if its dimensions are unusable).
    pub fn load(&self, path: &Path) -> Result<NativePixels<'_>, NativeError> {
        let c_path = path_to_cstring(path)?;

        let mut ptr: *mut f32 = std::ptr::null_mut();
        let mut width: c_int = 0;
        let mut height: c_int = 0;

        let ok = unsafe { (self.load)(c_path.as_ptr(), &mut ptr, &mut width, &mut height) };
        if !ok {
            return Err(NativeError::LoadFailed(path.display().to_string()));
        }

        let ptr = NonNull::new(ptr).ok_or(NativeError::NullBuffer)?;
        let mut pixels = NativePixels {
            ptr,
            len: 0,
            width: 0,
            height: 0,
            free: self.free,
            _codec: PhantomData,
        };

        let len = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w as usize)
                .checked_mul(h as usize)
                .and_then(|n| n.checked_mul(4)),
            _ => None,
        };

        match len {
            Some(len) => {
                pixels.len = len;
                pixels.width = width as u32;
                pixels.height = height as u32;
                Ok(pixels)
            }
            // `pixels` drops here and returns the buffer
            None => Err(NativeError::InvalidDimensions(width, height)),
        }
    }
}

impl std::fmt::Debug for NativeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeCodec")
            .field("kind", &self.kind)
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}

/// Float RGBA buffer owned by a native library, freed exactly once on drop
pub struct NativePixels<'a> {
    ptr: NonNull<f32>,
    len: usize,
    width: u32,
    height: u32,
    free: FreeFn,
    _codec: PhantomData<&'a NativeCodec>,
}

impl NativePixels<'_> {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Interleaved RGBA floats, `width * height * 4` long
    pub fn as_slice(&self) -> &[f32] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for NativePixels<'_> {
    fn drop(&mut self) {
        unsafe { (self.free)(self.ptr.as_ptr()) }
    }
}

fn search_paths(file_name: &str, extra_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = extra_dirs.iter().map(|d| d.join(file_name)).collect();

    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        paths.push(exe_dir.join("lib").join(os_dir_name()).join(file_name));
        paths.push(exe_dir.join(file_name));
    }

    paths
}

fn os_dir_name() -> &'static str {
    if cfg!(windows) {
        "Windows"
    } else if cfg!(target_os = "macos") {
        "macOS"
    } else {
        "Linux"
    }
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> Result<CString, NativeError> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| NativeError::InvalidPath(path.display().to_string()))
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> Result<CString, NativeError> {
    let s = path
        .to_str()
        .ok_or_else(|| NativeError::InvalidPath(path.display().to_string()))?;
    CString::new(s).map_err(|_| NativeError::InvalidPath(path.display().to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process stand-ins for the native libraries

    use std::ffi::{c_char, c_int};

    /// Leak a `[f32]` the way a C library would hand out a malloc'd buffer
    pub fn leak_buffer(data: Vec<f32>) -> *mut f32 {
        Box::into_raw(data.into_boxed_slice()) as *mut f32
    }

    /// Reclaim a buffer produced by [`leak_buffer`]
    ///
    /// # Safety
    /// `ptr` must come from `leak_buffer` with exactly `len` elements.
    pub unsafe fn reclaim_buffer(ptr: *mut f32, len: usize) {
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)));
    }

    pub unsafe fn write_out(
        pixels: *mut *mut f32,
        width: *mut c_int,
        height: *mut c_int,
        w: c_int,
        h: c_int,
        data: Vec<f32>,
    ) {
        *pixels = leak_buffer(data);
        *width = w;
        *height = h;
    }

    pub unsafe fn path_str<'a>(path: *const c_char) -> &'a str {
        std::ffi::CStr::from_ptr(path).to_str().unwrap_or("")
    }
}
