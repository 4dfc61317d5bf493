//! Avatar ingestion.
//!
//! A user-selected image goes through load, decode, resample and encode,
//! and comes out as a JPEG data URL small enough to live as a single string
//! field on the profile document. [`AvatarPipeline`] adds the persist step
//! and the in-flight guard on top of [`process`].

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::Path;

use base64::{engine::general_purpose, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::error::{DecodingError, ImageFormatHint};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{
    DynamicImage, GenericImageView, ImageDecoder, ImageError, ImageFormat,
    ImageReader, RgbImage,
};
use log::{debug, trace};
use thiserror::Error;
use tokio::task::JoinError;

use crate::PrepmindError;

pub mod pipeline;

pub use pipeline::{AvatarPipeline, PipelineState};

const KILOBYTE: u64 = 1024;
const MEGABYTE: u64 = 1024 * KILOBYTE;

/// Largest accepted input, checked against the declared size before any
/// byte is read.
pub const MAX_INPUT_BYTES: u64 = 5 * MEGABYTE;
/// Ceiling for the longer side of the stored avatar.
pub const MAX_DIMENSION: u32 = 300;
/// JPEG quality on the 1-100 scale (0.70).
pub const JPEG_QUALITY: u8 = 70;
/// Profile document field holding the encoded avatar.
pub const AVATAR_FIELD: &str = "photoBase64";

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

const OVERSIZE_MESSAGE: &str =
    "Image too large. Please select an image under 5MB.";
const FAILED_MESSAGE: &str = "Failed to update image. Try a smaller file.";
const BUSY_MESSAGE: &str = "A profile picture upload is already in progress.";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("image is {size} bytes, the limit is {limit} bytes")]
    Oversize { size: u64, limit: u64 },
    #[error("failed to read image: {0}")]
    Read(#[source] io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[source] ImageError),
    #[error("failed to encode avatar: {0}")]
    Encode(#[source] ImageError),
    #[error("failed to store avatar: {0}")]
    Persist(#[source] PrepmindError),
    #[error("an avatar upload is already in progress")]
    Busy,
    #[error("image worker stopped: {0}")]
    Worker(#[source] JoinError),
}

impl IngestError {
    /// Name of the stage that failed, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::Oversize { .. } => "validate",
            IngestError::Read(_) => "load",
            IngestError::Decode(_) => "decode",
            IngestError::Encode(_) => "encode",
            IngestError::Persist(_) => "persist",
            IngestError::Busy => "guard",
            IngestError::Worker(_) => "worker",
        }
    }

    /// Text shown to the user. Processing stages all share one message.
    pub fn user_message(&self) -> &'static str {
        match self {
            IngestError::Oversize { .. } => OVERSIZE_MESSAGE,
            IngestError::Busy => BUSY_MESSAGE,
            _ => FAILED_MESSAGE,
        }
    }
}

/// Raw image content supplied by the user together with its declared size.
pub struct ImageAsset {
    name: String,
    declared_size: u64,
    reader: Box<dyn Read + Send>,
}

impl ImageAsset {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let declared_size = bytes.len() as u64;
        Self::from_reader(name, declared_size, Cursor::new(bytes))
    }

    pub fn from_reader<R>(
        name: impl Into<String>,
        declared_size: u64,
        reader: R,
    ) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            name: name.into(),
            declared_size,
            reader: Box::new(reader),
        }
    }

    /// Open a file, taking the declared size from its metadata.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let declared_size = fs::metadata(path)?.len();
        let file = File::open(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::from_reader(name, declared_size, file))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("name", &self.name)
            .field("declared_size", &self.declared_size)
            .finish_non_exhaustive()
    }
}

/// JPEG data URL ready to be stored on the profile record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedAvatar(String);

impl EncodedAvatar {
    /// Wrap a value read back from the profile document.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JPEG bytes carried by the data URL.
    pub fn jpeg_bytes(&self) -> Result<Vec<u8>, IngestError> {
        let payload = self
            .0
            .strip_prefix(DATA_URL_PREFIX)
            .unwrap_or(&self.0);

        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| {
                IngestError::Decode(ImageError::Decoding(DecodingError::new(
                    ImageFormatHint::Exact(ImageFormat::Jpeg),
                    e,
                )))
            })
    }

    /// Parse the stored string back into a bitmap.
    pub fn decode_bitmap(&self) -> Result<DynamicImage, IngestError> {
        let bytes = self.jpeg_bytes()?;
        image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .map_err(IngestError::Decode)
    }
}

impl fmt::Display for EncodedAvatar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EncodedAvatar> for String {
    fn from(value: EncodedAvatar) -> Self {
        value.0
    }
}

pub fn check_declared_size(size: u64) -> Result<(), IngestError> {
    if size > MAX_INPUT_BYTES {
        return Err(IngestError::Oversize {
            size,
            limit: MAX_INPUT_BYTES,
        });
    }
    Ok(())
}

/// Read the whole asset. The source must yield exactly its declared size.
pub fn load(asset: ImageAsset) -> Result<Vec<u8>, IngestError> {
    check_declared_size(asset.declared_size)?;

    let expected = asset.declared_size;
    let mut bytes = Vec::with_capacity(expected as usize);
    asset
        .reader
        .take(expected + 1)
        .read_to_end(&mut bytes)
        .map_err(IngestError::Read)?;

    let actual = bytes.len() as u64;
    if actual != expected {
        let kind = if actual < expected {
            io::ErrorKind::UnexpectedEof
        } else {
            io::ErrorKind::InvalidData
        };
        return Err(IngestError::Read(io::Error::new(
            kind,
            format!(
                "{} declared {expected} bytes but yielded {actual}",
                asset.name
            ),
        )));
    }

    trace!("loaded {} bytes from {}", actual, asset.name);
    Ok(bytes)
}

/// Any raster format the `image` crate recognises is accepted. The EXIF
/// orientation, when present, is applied so the bitmap comes out upright.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, IngestError> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| IngestError::Decode(ImageError::IoError(e)))?
        .into_decoder()
        .map_err(IngestError::Decode)?;

    let orientation = decoder.orientation().unwrap_or_else(|e| {
        debug!("ignoring unreadable orientation: {e}");
        Orientation::NoTransforms
    });
    let mut bitmap =
        DynamicImage::from_decoder(decoder).map_err(IngestError::Decode)?;

    if orientation != Orientation::NoTransforms {
        trace!("applying {orientation:?}");
        bitmap.apply_orientation(orientation);
    }
    Ok(bitmap)
}

/// Output size for a `width` x `height` bitmap: the longer side is capped at
/// [`MAX_DIMENSION`], the shorter one follows proportionally. Never enlarges.
pub fn target_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width >= height {
        if width <= MAX_DIMENSION {
            return (width, height);
        }
        (MAX_DIMENSION, proportional(height, width))
    } else {
        if height <= MAX_DIMENSION {
            return (width, height);
        }
        (proportional(width, height), MAX_DIMENSION)
    }
}

fn proportional(side: u32, longer: u32) -> u32 {
    let scaled =
        f64::from(side) * f64::from(MAX_DIMENSION) / f64::from(longer);
    (scaled.round() as u32).max(1)
}

pub fn resample(bitmap: DynamicImage) -> DynamicImage {
    let (width, height) = bitmap.dimensions();
    let (target_width, target_height) = target_dimensions(width, height);
    if (target_width, target_height) == (width, height) {
        return bitmap;
    }

    trace!(
        "resampling {width}x{height} to {target_width}x{target_height}"
    );
    bitmap.resize_exact(target_width, target_height, FilterType::Triangle)
}

pub fn encode(bitmap: &DynamicImage) -> Result<EncodedAvatar, IngestError> {
    let rgb = flatten_onto_black(bitmap);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(IngestError::Encode)?;

    let encoded = general_purpose::STANDARD.encode(&jpeg);
    Ok(EncodedAvatar(format!("{DATA_URL_PREFIX}{encoded}")))
}

/// JPEG has no alpha channel; transparent areas end up black.
fn flatten_onto_black(bitmap: &DynamicImage) -> RgbImage {
    if !bitmap.color().has_alpha() {
        return bitmap.to_rgb8();
    }

    let rgba = bitmap.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Load, decode, resample and encode. Nothing is persisted here.
pub fn process(asset: ImageAsset) -> Result<EncodedAvatar, IngestError> {
    let bytes = load(asset)?;
    let bitmap = decode(&bytes)?;
    drop(bytes);

    let scaled = resample(bitmap);
    encode(&scaled)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use rstest::rstest;

    use super::*;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    struct WatchedReader(Arc<AtomicBool>);

    impl Read for WatchedReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            self.0.store(true, Ordering::SeqCst);
            Ok(0)
        }
    }

    #[rstest]
    #[case((4000, 2000), (300, 150))]
    #[case((200, 100), (200, 100))]
    #[case((300, 300), (300, 300))]
    #[case((1000, 1000), (300, 300))]
    #[case((500, 1000), (150, 300))]
    #[case((400, 900), (133, 300))]
    #[case((301, 1), (300, 1))]
    #[case((1, 5000), (1, 300))]
    fn target_dimensions_cap_longer_side(
        #[case] input: (u32, u32),
        #[case] expected: (u32, u32),
    ) {
        assert_eq!(target_dimensions(input.0, input.1), expected);
    }

    #[test]
    fn landscape_is_capped_at_300() {
        let asset = ImageAsset::from_bytes("wide.png", png_bytes(1200, 600));
        let avatar = process(asset).unwrap();

        assert!(avatar.as_str().starts_with("data:image/jpeg;base64,"));
        let bitmap = avatar.decode_bitmap().unwrap();
        assert_eq!(bitmap.dimensions(), (300, 150));
    }

    #[test]
    fn small_image_is_not_enlarged() {
        let asset = ImageAsset::from_bytes("small.png", png_bytes(120, 80));
        let bitmap = process(asset).unwrap().decode_bitmap().unwrap();
        assert_eq!(bitmap.dimensions(), (120, 80));
    }

    #[test]
    fn second_pass_keeps_dimensions() {
        let asset = ImageAsset::from_bytes("tall.png", png_bytes(400, 900));
        let first = process(asset).unwrap();
        let first_dims = first.decode_bitmap().unwrap().dimensions();

        let again =
            ImageAsset::from_bytes("again.jpg", first.jpeg_bytes().unwrap());
        let second = process(again).unwrap();

        assert_eq!(first_dims, (133, 300));
        assert_eq!(second.decode_bitmap().unwrap().dimensions(), first_dims);
    }

    #[test]
    fn oversize_is_rejected_before_reading() {
        let touched = Arc::new(AtomicBool::new(false));
        let asset = ImageAsset::from_reader(
            "huge.jpg",
            6 * MEGABYTE,
            WatchedReader(touched.clone()),
        );

        let err = process(asset).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Oversize { size, .. } if size == 6 * MEGABYTE
        ));
        assert_eq!(err.user_message(), OVERSIZE_MESSAGE);
        assert!(!touched.load(Ordering::SeqCst));
    }

    #[test]
    fn exactly_five_megabytes_is_accepted() {
        assert!(check_declared_size(MAX_INPUT_BYTES).is_ok());
        assert!(check_declared_size(MAX_INPUT_BYTES + 1).is_err());
    }

    #[test]
    fn corrupt_header_is_a_decode_failure() {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(b"definitely not chunks");
        let err = process(ImageAsset::from_bytes("broken.png", bytes))
            .unwrap_err();

        assert!(matches!(err, IngestError::Decode(_)));
        assert_eq!(err.stage(), "decode");
        assert_eq!(err.user_message(), FAILED_MESSAGE);
    }

    #[test]
    fn short_stream_is_a_read_failure() {
        let asset =
            ImageAsset::from_reader("cut.png", 100, Cursor::new(vec![0; 10]));
        let err = process(asset).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Read(ref e) if e.kind() == io::ErrorKind::UnexpectedEof
        ));
    }

    #[test]
    fn long_stream_is_a_read_failure() {
        let asset =
            ImageAsset::from_reader("long.png", 10, Cursor::new(vec![0; 20]));
        let err = load(asset).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Read(ref e) if e.kind() == io::ErrorKind::InvalidData
        ));
        assert_eq!(err.stage(), "load");
    }

    /// JPEG whose APP1 segment carries EXIF orientation `value`.
    fn jpeg_with_orientation(width: u32, height: u32, value: u8) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| {
            Rgb([(x % 256) as u8, 90, 30])
        });
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 90)
            .encode_image(&img)
            .unwrap();

        let mut tiff = b"MM\x00\x2a\x00\x00\x00\x08".to_vec();
        tiff.extend_from_slice(&[0x00, 0x01]);
        tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03]);
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        tiff.extend_from_slice(&[0x00, value, 0x00, 0x00]);
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut app1 = b"Exif\x00\x00".to_vec();
        app1.extend_from_slice(&tiff);
        let length = (app1.len() + 2) as u16;

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xff, 0xe1]);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn exif_rotation_is_applied_before_resampling() {
        let rotated = jpeg_with_orientation(800, 400, 6);
        assert_eq!(decode(&rotated).unwrap().dimensions(), (400, 800));

        let asset = ImageAsset::from_bytes("phone.jpg", rotated);
        let bitmap = process(asset).unwrap().decode_bitmap().unwrap();
        assert_eq!(bitmap.dimensions(), (150, 300));

        let upright = jpeg_with_orientation(800, 400, 1);
        let asset = ImageAsset::from_bytes("upright.jpg", upright);
        let bitmap = process(asset).unwrap().decode_bitmap().unwrap();
        assert_eq!(bitmap.dimensions(), (300, 150));
    }

    #[test]
    fn transparency_is_flattened_onto_black() {
        let img = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 0]));
        let avatar = encode(&DynamicImage::ImageRgba8(img)).unwrap();
        let bitmap = avatar.decode_bitmap().unwrap().to_rgb8();

        let Rgb([r, g, b]) = *bitmap.get_pixel(8, 8);
        assert!(r < 10 && g < 10 && b < 10, "got {r},{g},{b}");
    }

    #[test]
    fn opened_file_declares_its_metadata_size() {
        use tempdir::TempDir;
        let dir = TempDir::new("prepmind_avatar").unwrap();
        let path = dir.path().join("photo.png");
        let bytes = png_bytes(40, 20);
        fs::write(&path, &bytes).unwrap();

        let asset = ImageAsset::open(&path).unwrap();
        assert_eq!(asset.name(), "photo.png");
        assert_eq!(asset.declared_size(), bytes.len() as u64);
        assert_eq!(load(asset).unwrap(), bytes);
    }
}
