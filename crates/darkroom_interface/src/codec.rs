//! Image codec boundary.

use darkroom_core::{EncodePolicy, ImageProbe};
use darkroom_error::DarkroomResult;

/// Decode, resize and encode primitive.
///
/// All methods are CPU-bound and synchronous; async callers run them on a
/// blocking thread. Probing reads only the header, so it can succeed on data
/// whose pixel payload later fails to decode.
pub trait ImageCodec: Send + Sync + 'static {
    /// Decoded pixel buffer, reused across every rendition of one image.
    type Decoded: Send + Sync + 'static;

    /// Read declared width, height and format without a full decode.
    fn probe(&self, data: &[u8]) -> DarkroomResult<ImageProbe>;

    /// Decode the full pixel buffer.
    fn decode(&self, data: &[u8]) -> DarkroomResult<Self::Decoded>;

    /// Resize to exactly `width`×`height` and encode under `policy`.
    fn render(
        &self,
        image: &Self::Decoded,
        width: u32,
        height: u32,
        policy: &EncodePolicy,
    ) -> DarkroomResult<Vec<u8>>;
}
