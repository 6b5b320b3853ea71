use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use image::RgbImage;

use crate::shared::binary::{ReadLe, WriteLe};
use crate::shared::constants::SERIALIZATION_CHUNK_BYTES;
use crate::shared::error::{ArchiveError, Result};

const SERIALIZATION_VERSION: u32 = 1;

/// Geometry of a pixel buffer: `i` runs along a row, `j` down the rows and
/// `plane` across channels. Strides are in bytes and may be negative;
/// `origin` is the byte offset of pixel `(0, 0, 0)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageLayout {
    pub i_count: u32,
    pub j_count: u32,
    pub plane_count: u32,
    pub i_stride: isize,
    pub j_stride: isize,
    pub plane_stride: isize,
    pub origin: usize,
}

impl ImageLayout {
    /// Interleaved `RGBRGB...` rows with no padding.
    pub fn packed_rgb(width: u32, height: u32) -> Self {
        Self::interleaved(width, height, 3)
    }

    pub fn interleaved(width: u32, height: u32, planes: u32) -> Self {
        Self {
            i_count: width,
            j_count: height,
            plane_count: planes,
            i_stride: planes as isize,
            j_stride: width as isize * planes as isize,
            plane_stride: 1,
            origin: 0,
        }
    }

    /// One full image per channel.
    pub fn planar(width: u32, height: u32, planes: u32) -> Self {
        Self {
            i_count: width,
            j_count: height,
            plane_count: planes,
            i_stride: 1,
            j_stride: width as isize,
            plane_stride: width as isize * height as isize,
            origin: 0,
        }
    }

    /// 32-bit `BGRx` pixels exposed as RGB planes.
    pub fn bgr_pad32(width: u32, height: u32) -> Self {
        Self {
            i_count: width,
            j_count: height,
            plane_count: 3,
            i_stride: 4,
            j_stride: width as isize * 4,
            plane_stride: -1,
            origin: 2,
        }
    }

    /// Number of addressed samples, `None` when it does not fit a `usize`.
    pub fn sample_count(&self) -> Option<usize> {
        (self.i_count as usize)
            .checked_mul(self.j_count as usize)?
            .checked_mul(self.plane_count as usize)
    }

    fn is_empty(&self) -> bool {
        self.i_count == 0 || self.j_count == 0 || self.plane_count == 0
    }

    /// Smallest buffer length that holds every addressed byte, or `None`
    /// when some sample would fall before the start of the buffer.
    pub fn required_len(&self) -> Option<usize> {
        if self.is_empty() {
            return Some(0);
        }
        let spans = [
            (self.i_count, self.i_stride),
            (self.j_count, self.j_stride),
            (self.plane_count, self.plane_stride),
        ];
        let mut lowest = self.origin as i128;
        let mut highest = self.origin as i128;
        for (count, stride) in spans {
            let reach = (i128::from(count) - 1) * stride as i128;
            lowest += reach.min(0);
            highest += reach.max(0);
        }
        if lowest < 0 {
            return None;
        }
        usize::try_from(highest + 1).ok()
    }

    fn offset(&self, i: u32, j: u32, plane: u32) -> usize {
        let offset = self.origin as isize
            + i as isize * self.i_stride
            + j as isize * self.j_stride
            + plane as isize * self.plane_stride;
        offset as usize
    }

    fn is_packed_rgb(&self) -> bool {
        *self == Self::packed_rgb(self.i_count, self.j_count)
    }

    fn is_bgr_pad32(&self) -> bool {
        *self == Self::bgr_pad32(self.i_count, self.j_count)
    }
}

enum PixelStorage {
    Owned(Vec<u8>),
    Borrowed {
        buffer: Box<dyn AsRef<[u8]> + Send + Sync>,
        release: Option<Box<dyn FnOnce() + Send + Sync>>,
    },
}

impl PixelStorage {
    fn bytes(&self) -> &[u8] {
        match self {
            PixelStorage::Owned(data) => data,
            PixelStorage::Borrowed { buffer, .. } => (**buffer).as_ref(),
        }
    }
}

impl Drop for PixelStorage {
    fn drop(&mut self) {
        if let PixelStorage::Borrowed { release, .. } = self {
            if let Some(release) = release.take() {
                release();
            }
        }
    }
}

/// Immutable, shared-ownership pixel buffer with stride metadata.
///
/// Cloning shares the underlying bytes. An image with no samples is the
/// invalid image; decoders return it on failure and callers check
/// [`FrameImage::is_valid`] before use.
#[derive(Clone, Default)]
pub struct FrameImage {
    layout: ImageLayout,
    storage: Option<Arc<PixelStorage>>,
}

impl FrameImage {
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Adopts `data` as the image's storage.
    pub fn from_vec(data: Vec<u8>, layout: ImageLayout) -> Result<Self> {
        Self::check_layout(data.len(), &layout)?;
        if layout.is_empty() {
            return Ok(Self::invalid());
        }
        Ok(Self {
            layout,
            storage: Some(Arc::new(PixelStorage::Owned(data))),
        })
    }

    /// Copies `data` into owned storage.
    pub fn from_slice(data: &[u8], layout: ImageLayout) -> Result<Self> {
        Self::check_layout(data.len(), &layout)?;
        Self::from_vec(data.to_vec(), layout)
    }

    /// Wraps a caller-owned buffer without copying. `release` runs once the
    /// last image sharing the buffer is dropped or cleared.
    pub fn from_external<B>(
        buffer: B,
        layout: ImageLayout,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Result<Self>
    where
        B: AsRef<[u8]> + Send + Sync + 'static,
    {
        let storage = PixelStorage::Borrowed {
            buffer: Box::new(buffer),
            release: Some(Box::new(release)),
        };
        Self::check_layout(storage.bytes().len(), &layout)?;
        Ok(Self {
            layout,
            storage: Some(Arc::new(storage)),
        })
    }

    pub fn from_bitmap(bitmap: &RgbImage) -> Self {
        let (width, height) = bitmap.dimensions();
        Self::from_vec(bitmap.as_raw().clone(), ImageLayout::packed_rgb(width, height))
            .unwrap_or_default()
    }

    fn check_layout(len: usize, layout: &ImageLayout) -> Result<()> {
        match layout.sample_count() {
            None => {
                return Err(ArchiveError::Decode(format!(
                    "layout of {}x{}x{} samples is too large",
                    layout.i_count, layout.j_count, layout.plane_count
                )))
            }
            Some(samples) if samples > len => {
                return Err(ArchiveError::Decode(format!(
                    "buffer of {len} bytes cannot back {samples} samples"
                )))
            }
            Some(_) => {}
        }
        match layout.required_len() {
            Some(required) if required <= len => Ok(()),
            Some(required) => Err(ArchiveError::Decode(format!(
                "buffer of {len} bytes is smaller than the {required} bytes the layout addresses"
            ))),
            None => Err(ArchiveError::Decode(
                "layout addresses bytes before the start of the buffer".to_string(),
            )),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.storage.is_some() && !self.layout.is_empty()
    }

    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    pub fn i_count(&self) -> u32 {
        self.layout.i_count
    }

    pub fn j_count(&self) -> u32 {
        self.layout.j_count
    }

    pub fn plane_count(&self) -> u32 {
        self.layout.plane_count
    }

    pub fn i_stride(&self) -> isize {
        self.layout.i_stride
    }

    pub fn j_stride(&self) -> isize {
        self.layout.j_stride
    }

    pub fn plane_stride(&self) -> isize {
        self.layout.plane_stride
    }

    /// The whole backing buffer, including any bytes the layout skips.
    pub fn data(&self) -> &[u8] {
        self.storage.as_deref().map(PixelStorage::bytes).unwrap_or(&[])
    }

    pub fn pixel(&self, i: u32, j: u32, plane: u32) -> Option<u8> {
        let layout = &self.layout;
        if !self.is_valid() || i >= layout.i_count || j >= layout.j_count || plane >= layout.plane_count {
            return None;
        }
        self.data().get(layout.offset(i, j, plane)).copied()
    }

    /// Whether both images share one backing buffer.
    pub fn shares_storage_with(&self, other: &FrameImage) -> bool {
        match (&self.storage, &other.storage) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Resets to the invalid image, dropping this handle's share of the buffer.
    pub fn clear(&mut self) {
        self.storage = None;
        self.layout = ImageLayout::default();
    }

    /// Samples gathered into interleaved row-major order.
    pub fn to_packed(&self) -> Vec<u8> {
        let layout = &self.layout;
        let mut out = Vec::with_capacity(layout.sample_count().unwrap_or(0));
        if !self.is_valid() {
            return out;
        }
        let data = self.data();
        for j in 0..layout.j_count {
            for i in 0..layout.i_count {
                for p in 0..layout.plane_count {
                    out.push(data[layout.offset(i, j, p)]);
                }
            }
        }
        out
    }

    /// Converts to a packed RGB bitmap. Single-plane images are expanded to
    /// grey; any other plane count is a decode error.
    pub fn to_bitmap(&self) -> Result<RgbImage> {
        if !self.is_valid() {
            return Err(ArchiveError::Decode("image is empty".to_string()));
        }
        let layout = &self.layout;
        let (width, height) = (layout.i_count, layout.j_count);
        let pixels = width as usize * height as usize;
        let data = self.data();

        let rgb = if layout.is_packed_rgb() {
            data[layout.origin..layout.origin + pixels * 3].to_vec()
        } else if layout.is_bgr_pad32() && data.len() >= pixels * 4 {
            let start = layout.origin - 2;
            data[start..start + pixels * 4]
                .chunks_exact(4)
                .flat_map(|bgrx| [bgrx[2], bgrx[1], bgrx[0]])
                .collect()
        } else {
            match layout.plane_count {
                1 => self.to_packed().into_iter().flat_map(|v| [v, v, v]).collect(),
                3 => self.to_packed(),
                n => {
                    return Err(ArchiveError::Decode(format!(
                        "cannot convert a {n}-plane image to RGB"
                    )))
                }
            }
        };

        RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| ArchiveError::Decode("bitmap size mismatch".to_string()))
    }

    /// Writes the layout followed by the raw buffer in length-prefixed chunks.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        let layout = &self.layout;
        writer.write_u32_le(SERIALIZATION_VERSION)?;
        writer.write_u32_le(layout.i_count)?;
        writer.write_u32_le(layout.j_count)?;
        writer.write_u32_le(layout.plane_count)?;
        writer.write_i64_le(layout.i_stride as i64)?;
        writer.write_i64_le(layout.j_stride as i64)?;
        writer.write_i64_le(layout.plane_stride as i64)?;
        writer.write_u64_le(layout.origin as u64)?;

        let data = self.data();
        writer.write_u64_le(data.len() as u64)?;
        for chunk in data.chunks(SERIALIZATION_CHUNK_BYTES) {
            writer.write_u32_le(chunk.len() as u32)?;
            writer.write_all(chunk)?;
        }
        Ok(())
    }

    /// Reads an image written by [`FrameImage::write_to`].
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let corrupt = |e: std::io::Error| ArchiveError::Decode(format!("serialized image: {e}"));

        let version = reader.read_u32_le().map_err(corrupt)?;
        if version != SERIALIZATION_VERSION {
            return Err(ArchiveError::Decode(format!(
                "unsupported image serialization version {version}"
            )));
        }
        let i_count = reader.read_u32_le().map_err(corrupt)?;
        let j_count = reader.read_u32_le().map_err(corrupt)?;
        let plane_count = reader.read_u32_le().map_err(corrupt)?;
        let i_stride = reader.read_i64_le().map_err(corrupt)?;
        let j_stride = reader.read_i64_le().map_err(corrupt)?;
        let plane_stride = reader.read_i64_le().map_err(corrupt)?;
        let origin = reader.read_u64_le().map_err(corrupt)?;
        let layout = ImageLayout {
            i_count,
            j_count,
            plane_count,
            i_stride: to_isize(i_stride)?,
            j_stride: to_isize(j_stride)?,
            plane_stride: to_isize(plane_stride)?,
            origin: usize::try_from(origin)
                .map_err(|_| ArchiveError::Decode("origin out of range".to_string()))?,
        };

        let total = reader.read_u64_le().map_err(corrupt)?;
        let mut data = Vec::new();
        let mut remaining = total;
        while remaining > 0 {
            let chunk_len = u64::from(reader.read_u32_le().map_err(corrupt)?);
            if chunk_len == 0 || chunk_len > remaining || chunk_len > SERIALIZATION_CHUNK_BYTES as u64 {
                return Err(ArchiveError::Decode(format!(
                    "invalid chunk of {chunk_len} bytes with {remaining} bytes outstanding"
                )));
            }
            let read = reader
                .by_ref()
                .take(chunk_len)
                .read_to_end(&mut data)
                .map_err(corrupt)?;
            if read as u64 != chunk_len {
                return Err(ArchiveError::Decode("truncated image data".to_string()));
            }
            remaining -= chunk_len;
        }

        Self::from_vec(data, layout)
    }
}

fn to_isize(value: i64) -> Result<isize> {
    isize::try_from(value).map_err(|_| ArchiveError::Decode(format!("stride {value} out of range")))
}

impl fmt::Debug for FrameImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameImage")
            .field("layout", &self.layout)
            .field("bytes", &self.data().len())
            .finish()
    }
}
