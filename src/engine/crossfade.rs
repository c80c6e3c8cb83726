//! Progress math and frame rendering for image-to-image transitions.

use std::path::Path;

use chrono::{Duration, NaiveTime};
use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::timed::clock::{clock_diff, mod24};
use crate::timed::error::{TimedError, TimedResult};

/// True while `now` lies inside the `[from, from + window)` window on the
/// 24h circle.
pub fn in_window(from: NaiveTime, window: Duration, now: NaiveTime) -> bool {
    clock_diff(now, from) < window
}

/// How far a transition ending at `up_to` has progressed at `now`, in
/// `[0, 1]`. The `loop_wait` offset keeps the ratio from resolving fully
/// before the window's final tick. A zero-length window is already done.
pub fn transition_ratio(
    window: Duration,
    up_to: NaiveTime,
    now: NaiveTime,
    loop_wait: Duration,
) -> f64 {
    if window <= Duration::zero() {
        return 1.0;
    }
    let remaining = mod24(clock_diff(up_to, now) - loop_wait);
    let elapsed = mod24(window - remaining);
    let ratio = elapsed.num_milliseconds() as f64 / window.num_milliseconds() as f64;
    ratio.clamp(0.0, 1.0)
}

/// Pixel-wise linear interpolation; 0 is fully `from`, 1 is fully `to`.
/// A size mismatch is resolved by resampling `to` onto `from`'s geometry.
pub fn blend(from: &RgbaImage, to: &RgbaImage, ratio: f64) -> RgbaImage {
    let ratio = ratio.clamp(0.0, 1.0);
    let (width, height) = from.dimensions();
    let resized;
    let to = if to.dimensions() == (width, height) {
        to
    } else {
        resized = imageops::resize(to, width, height, FilterType::Triangle);
        &resized
    };

    let mut out = RgbaImage::new(width, height);
    for (pixel, (a, b)) in out
        .pixels_mut()
        .zip(from.pixels().zip(to.pixels()))
    {
        for channel in 0..4 {
            let start = f64::from(a.0[channel]);
            let end = f64::from(b.0[channel]);
            pixel.0[channel] = (start + (end - start) * ratio).round() as u8;
        }
    }
    out
}

/// Blends two image files and writes the frame to `out_path`. The caller
/// holds the shared set lock for the whole write-then-apply sequence.
pub fn crossfade_files(
    from_path: &Path,
    to_path: &Path,
    out_path: &Path,
    ratio: f64,
) -> TimedResult<()> {
    for path in [from_path, to_path] {
        if !path.exists() {
            return Err(TimedError::MissingFile(path.to_path_buf()));
        }
    }
    let from = image::open(from_path)
        .map_err(|err| {
            TimedError::Sink(format!(
                "could not crossfade images in transition: {}: {err}",
                from_path.display()
            ))
        })?
        .to_rgba8();
    let to = image::open(to_path)
        .map_err(|err| {
            TimedError::Sink(format!(
                "could not crossfade images in transition: {}: {err}",
                to_path.display()
            ))
        })?
        .to_rgba8();
    let frame = blend(&from, &to, ratio);
    frame.save(out_path).map_err(|err| {
        TimedError::Sink(format!(
            "could not write crossfade frame {}: {err}",
            out_path.display()
        ))
    })?;
    Ok(())
}
