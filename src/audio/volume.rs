/// Unity gain in percent.
pub const UNITY: u16 = 100;

/// Scale one sample by `percent`, saturating at the i16 range.
#[inline]
pub fn scale_sample(sample: i16, percent: u16) -> i16 {
    let scaled = i32::from(sample) * i32::from(percent) / i32::from(UNITY);
    scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Scale little-endian 16-bit PCM in place. A trailing odd byte is left as is.
pub fn scale_in_place(pcm: &mut [u8], percent: u16) {
    if percent == UNITY {
        return;
    }
    for frame in pcm.chunks_exact_mut(2) {
        let sample = i16::from_le_bytes([frame[0], frame[1]]);
        frame.copy_from_slice(&scale_sample(sample, percent).to_le_bytes());
    }
}
