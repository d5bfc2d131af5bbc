//! Pluggable worker transforms.
//!
//! A [`Transform`] consumes a batch of raw frame payloads plus the prompt
//! carried by the last frame in that batch and returns exactly one output
//! payload per input, in order. Workers are configured with one transform
//! for their whole lifetime; there is no per-frame dispatch.

use base64::Engine;
use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

/// A worker-side frame transform.
///
/// Implementations must return a vector the same length as `batch`, in the
/// same order — a length mismatch is treated as a worker bug, not a
/// recoverable condition.
pub trait Transform: Send {
    fn apply(&mut self, batch: &[Vec<u8>], prompt: &str) -> anyhow::Result<Vec<Vec<u8>>>;

    /// Human-readable name, used only for logging.
    fn name(&self) -> &'static str;
}

/// Returns each input payload unchanged.
pub struct Identity;

impl Transform for Identity {
    fn apply(&mut self, batch: &[Vec<u8>], _prompt: &str) -> anyhow::Result<Vec<Vec<u8>>> {
        Ok(batch.to_vec())
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Inverts every pixel's RGB channels, matching `inverter.py`'s
/// `invert_frame`. Frames that fail to decode as an image pass through
/// unchanged with a warning, rather than failing the whole batch.
pub struct Inverter;

impl Transform for Inverter {
    fn apply(&mut self, batch: &[Vec<u8>], _prompt: &str) -> anyhow::Result<Vec<Vec<u8>>> {
        let mut out = Vec::with_capacity(batch.len());
        for payload in batch {
            out.push(invert_one(payload));
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "inverter"
    }
}

fn invert_one(payload: &[u8]) -> Vec<u8> {
    let Ok(img) = image::load_from_memory(payload) else {
        tracing::warn!("inverter: frame did not decode as an image, passing through");
        return payload.to_vec();
    };
    let mut rgb: RgbImage = img.to_rgb8();
    for pixel in rgb.pixels_mut() {
        pixel[0] = 255 - pixel[0];
        pixel[1] = 255 - pixel[1];
        pixel[2] = 255 - pixel[2];
    }
    let mut buf = std::io::Cursor::new(Vec::new());
    match rgb.write_to(&mut buf, ImageFormat::Png) {
        Ok(()) => buf.into_inner(),
        Err(e) => {
            tracing::warn!(error = %e, "inverter: failed to re-encode, passing through");
            payload.to_vec()
        }
    }
}

#[derive(Serialize)]
struct DiffusionRequest {
    prompt: String,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct DiffusionResponse {
    images: Vec<String>,
}

/// Calls an external image-model HTTP endpoint for the batch, carrying the
/// last frame's prompt as the generation prompt.
///
/// `diffusion_worker.py` runs its model in-process; loading a GPU model is
/// out of scope here in the same way image codecs are, so this variant
/// instead delegates to a model server over HTTP: a base64-encoded batch
/// and prompt go out as JSON, a same-length batch of base64 images comes
/// back.
pub struct Diffusion {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl Diffusion {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint,
        }
    }
}

impl Transform for Diffusion {
    fn apply(&mut self, batch: &[Vec<u8>], prompt: &str) -> anyhow::Result<Vec<Vec<u8>>> {
        let images: Vec<String> = batch
            .iter()
            .map(|p| base64::engine::general_purpose::STANDARD.encode(p))
            .collect();
        let request = DiffusionRequest {
            prompt: prompt.to_string(),
            images,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()?
            .error_for_status()?
            .json::<DiffusionResponse>()?;
        if response.images.len() != batch.len() {
            anyhow::bail!(
                "diffusion endpoint returned {} images for a batch of {}",
                response.images.len(),
                batch.len()
            );
        }
        response
            .images
            .into_iter()
            .map(|b64| {
                base64::engine::general_purpose::STANDARD
                    .decode(b64)
                    .map_err(anyhow::Error::from)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "diffusion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_returns_batch_unchanged_and_same_length() {
        let mut t = Identity;
        let batch = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let out = t.apply(&batch, "unused").unwrap();
        assert_eq!(out, batch);
    }

    #[test]
    fn inverter_passes_through_undecodable_payload() {
        let mut t = Inverter;
        let batch = vec![vec![0xde, 0xad, 0xbe, 0xef]];
        let out = t.apply(&batch, "").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], batch[0]);
    }

    #[test]
    fn inverter_round_trips_a_real_image() {
        let mut img = RgbImage::new(2, 2);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([10, 20, 30]);
        }
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        let encoded = buf.into_inner();

        let mut t = Inverter;
        let out = t.apply(&[encoded], "").unwrap();
        assert_eq!(out.len(), 1);
        let decoded = image::load_from_memory(&out[0]).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0), &image::Rgb([245, 235, 225]));
    }
}
