//! Re-encoding: decode the first frame, write a brand new file.
//!
//! Nothing from the input container is copied; metadata cannot survive a
//! trip through a pixel surface. The pipeline holds an ordered list of
//! codec backends and tries each decode+encode as a unit, so preferring or
//! adding a backend is a list edit rather than control flow.

use tracing::{debug, trace};

use crate::types::ImageKind;

pub mod backend;
pub mod native;
pub mod raster;

pub use backend::{CodecBackend, CodecError, DecodedFrame, EncodeParams};
pub use native::NativeCodec;
pub use raster::RasterSurface;

/// A freshly encoded image and the dimensions it carries.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Ordered backend chain. The format-directed codec goes first; the
/// sniffing raster fallback catches misdeclared files.
pub struct ReencodePipeline {
    backends: Vec<Box<dyn CodecBackend>>,
}

impl Default for ReencodePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ReencodePipeline {
    /// The standard chain: native codec, then raster fallback.
    pub fn new() -> Self {
        Self::with_backends(vec![Box::new(NativeCodec), Box::new(RasterSurface)])
    }

    /// A pipeline with a caller-chosen backend order.
    pub fn with_backends(backends: Vec<Box<dyn CodecBackend>>) -> Self {
        Self { backends }
    }

    /// Re-encode `data` into the target format.
    ///
    /// Each backend is one attempt: decode the first frame, encode it. The
    /// first attempt that produces bytes wins; when every backend fails the
    /// last error is returned. The decoded frame is consumed per attempt,
    /// so pixel memory is released before the next backend runs.
    pub fn reencode(
        &self,
        data: &[u8],
        kind: ImageKind,
        params: &EncodeParams,
    ) -> Result<EncodedImage, CodecError> {
        let mut last_error = CodecError::Decode("no codec backends configured".to_string());

        for backend in &self.backends {
            let frame = match backend.decode_first_frame(data, kind) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(backend = backend.name(), error = %e, "decode attempt failed");
                    last_error = e;
                    continue;
                }
            };
            let (width, height) = (frame.width, frame.height);

            match backend.encode(frame, params) {
                Ok(bytes) => {
                    trace!(
                        backend = backend.name(),
                        width,
                        height,
                        out_bytes = bytes.len(),
                        "re-encode succeeded"
                    );
                    return Ok(EncodedImage {
                        bytes,
                        width,
                        height,
                    });
                }
                Err(e) => {
                    debug!(backend = backend.name(), error = %e, "encode attempt failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
