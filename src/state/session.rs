/// Working image session.
///
/// The editor owns exactly one working image at a time. Replacing it
/// (new upload or committed edit) starts a new session: a fresh token is
/// issued and any response still in flight for the old session is
/// discarded when it finally arrives.

use tokio::task;

/// Identifies one image session. Async completions carry the token of
/// the session that spawned them; a mismatch marks the response as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionToken(u64);

impl SessionToken {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }
}

/// The current photo being edited: encoded bytes (kept around for
/// multipart upload) plus natural pixel dimensions decoded at load time.
#[derive(Debug, Clone)]
pub struct WorkingImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

impl WorkingImage {
    /// Build a working image from encoded bytes, probing dimensions.
    ///
    /// The dimensions are what the coordinate mapper calls the natural
    /// size, so an image that fails to decode is rejected here rather
    /// than producing unmappable clicks later.
    pub fn from_bytes(bytes: Vec<u8>, file_name: String) -> Result<Self, String> {
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| format!("Failed to decode {}: {}", file_name, e))?;

        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            bytes,
            file_name,
        })
    }

    /// Async wrapper for [`WorkingImage::from_bytes`]. Decoding a large
    /// photo is CPU work, so it runs on the blocking pool.
    pub async fn decode(bytes: Vec<u8>, file_name: String) -> Result<Self, String> {
        task::spawn_blocking(move || Self::from_bytes(bytes, file_name))
            .await
            .map_err(|e| format!("Task join error: {}", e))?
    }
}

/// One working image bound to its session token.
#[derive(Debug)]
pub struct ImageSession {
    working: WorkingImage,
    token: SessionToken,
}

impl ImageSession {
    pub fn new(working: WorkingImage, token: SessionToken) -> Self {
        Self { working, token }
    }

    pub fn working(&self) -> &WorkingImage {
        &self.working
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Swap in a new working image under a fresh token.
    pub fn replace_image(&mut self, working: WorkingImage, token: SessionToken) {
        self.working = working;
        self.token = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_undecodable_bytes() {
        let result = WorkingImage::from_bytes(vec![0, 1, 2, 3], "broken.png".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn probes_dimensions_from_encoded_bytes() {
        // Minimal 2x3 PNG produced by the image crate itself
        let mut encoded = Vec::new();
        let buffer = image::RgbImage::from_pixel(2, 3, image::Rgb([120, 90, 60]));
        image::DynamicImage::ImageRgb8(buffer)
            .write_to(
                &mut std::io::Cursor::new(&mut encoded),
                image::ImageFormat::Png,
            )
            .unwrap();

        let working = WorkingImage::from_bytes(encoded, "room.png".to_string()).unwrap();

        assert_eq!((working.width, working.height), (2, 3));
    }

    #[test]
    fn replace_swaps_image_and_token_together() {
        let first = WorkingImage {
            bytes: vec![1],
            file_name: "a.png".into(),
            width: 10,
            height: 10,
        };
        let second = WorkingImage {
            bytes: vec![2],
            file_name: "b.png".into(),
            width: 20,
            height: 20,
        };

        let mut session = ImageSession::new(first, SessionToken::new(1));
        session.replace_image(second, SessionToken::new(2));

        assert_eq!(session.token(), SessionToken::new(2));
        assert_eq!(session.working().width, 20);
    }
}
