//! Oregon Scientific v2.1/v3.0 temperature/humidity frame encoder.
//!
//! Produces the public wire format bit-exactly (see
//! <https://wmrx00.sourceforge.net/> for the protocol specification), so
//! third-party receivers of these frames can decode them. The protocol is
//! nibble-addressed internally: every field is emitted as 4-bit units into a
//! fixed byte buffer, with three independent layout switches covering the
//! transmitter-side bit ordering options (bit inversion, input nibble order,
//! output nibble order).

use micromath::F32Ext;

/// Largest possible frame: v3.0 preamble variant, 13 bytes.
pub const MAX_FRAME_SIZE: usize = 13;

/// Symbol rate of the modulated channel in bit/s.
pub const BIT_RATE: u16 = 1024;

/// Model ids using the 2-byte preamble (OS protocol v2.1).
const V21_DEVICE_IDS: [u16; 2] = [0x1D20, 0x1D30];

/// Reusable encoder for Oregon Scientific temperature/humidity frames.
///
/// Holds the frame buffer plus transient nibble/checksum counters that are
/// reset at the start of every [`encode_th`](OregonEncoder::encode_th) call.
/// Not reentrant: a second encode must not start before the previous frame
/// slice is consumed, which the single-threaded controller guarantees.
#[derive(Debug)]
pub struct OregonEncoder {
    frame: [u8; MAX_FRAME_SIZE],
    nibbles: usize,
    checksum: u8,
    invert_bits: bool,
    flip_input_nibbles: bool,
    flip_output_nibbles: bool,
}

impl OregonEncoder {
    pub fn new() -> Self {
        Self {
            frame: [0; MAX_FRAME_SIZE],
            nibbles: 0,
            checksum: 0,
            invert_bits: false,
            // Oregon receivers expect the most significant nibble of each
            // source byte first.
            flip_input_nibbles: true,
            flip_output_nibbles: false,
        }
    }

    /// Complement every nibble before packing. Default disabled; used when
    /// the transmitter does not invert on its own.
    pub fn set_invert_bits(&mut self, enabled: bool) {
        self.invert_bits = enabled;
    }

    /// Emit the high nibble of each source byte first. Default enabled.
    pub fn set_flip_input_nibbles(&mut self, enabled: bool) {
        self.flip_input_nibbles = enabled;
    }

    /// Place the first-produced nibble into the high nibble of each output
    /// byte. Default disabled = first nibble goes to the low nibble.
    pub fn set_flip_output_nibbles(&mut self, enabled: bool) {
        self.flip_output_nibbles = enabled;
    }

    /// Encode one temperature/humidity reading into a transmit-ready frame.
    ///
    /// * `device_id` — model id; 0x1D20/0x1D30 select the v2.1 frame layout
    ///   (12 bytes), anything else the v3.0 layout (13 bytes)
    /// * `channel` — 1..=3; any other value yields an empty slice, the sole
    ///   validation failure ("do not transmit", never fatal)
    /// * `rolling_code` — house code assigned at power up
    /// * `temperature_c` — rounded to tenths, magnitude clamped to 99.9
    /// * `humidity_pct` — clamped to 0..=99
    ///
    /// The returned slice borrows the internal buffer and stays valid until
    /// the next encode.
    pub fn encode_th(
        &mut self,
        device_id: u16,
        channel: u8,
        rolling_code: u8,
        low_battery: bool,
        temperature_c: f32,
        humidity_pct: u8,
    ) -> &[u8] {
        self.frame = [0; MAX_FRAME_SIZE];
        self.nibbles = 0;
        self.checksum = 0;

        if !(1..=3).contains(&channel) {
            log::warn!("invalid channel {}, refusing to encode", channel);
            return &[];
        }

        // Preamble and sync let the receiver lock onto the bitstream. They
        // are not covered by the checksum.
        let preamble_bytes = if V21_DEVICE_IDS.contains(&device_id) {
            2
        } else {
            3
        };
        for _ in 0..preamble_bytes {
            self.push_byte(0xFF);
        }
        self.push_nibble(0b1010);
        self.checksum = 0;

        self.push_byte((device_id >> 8) as u8);
        self.push_byte((device_id & 0xFF) as u8);
        self.push_nibble((1 << (channel - 1)) & 0xF);
        self.push_byte(rolling_code);
        self.push_nibble(if low_battery { 0x4 } else { 0x0 });

        // Temperature: three BCD digits, least significant first, then the
        // sign nibble.
        let mut t = (temperature_c.abs() * 10.0).round() as u16;
        if t > 999 {
            t = 999;
        }
        for _ in 0..3 {
            self.push_nibble((t % 10) as u8);
            t /= 10;
        }
        self.push_nibble(if temperature_c >= 0.0 { 0 } else { 1 });

        // Humidity: two BCD digits, least significant first.
        let mut h = humidity_pct.min(99);
        for _ in 0..2 {
            self.push_nibble(h % 10);
            h /= 10;
        }

        // Filler nibble.
        self.push_nibble(0);

        // Checksum over every nibble since the sync, least significant
        // nibble first.
        let c = self.checksum;
        self.push_nibble(c & 0xF);
        self.push_nibble(c >> 4);

        // Postamble pads the frame to a whole number of bytes.
        if self.nibbles % 2 == 0 {
            self.push_byte(0xFF);
        } else {
            self.push_nibble(0xF);
        }

        &self.frame[..self.nibbles.div_ceil(2)]
    }

    fn push_nibble(&mut self, nibble: u8) {
        let index = self.nibbles / 2;
        if index >= MAX_FRAME_SIZE {
            return;
        }
        let mut n = nibble & 0xF;
        // Checksum accumulates the logical value, not the inverted one.
        self.checksum = self.checksum.wrapping_add(n);
        if self.invert_bits {
            n = !n & 0xF;
        }
        let first_of_byte = self.nibbles % 2 == 0;
        if self.flip_output_nibbles {
            if first_of_byte {
                self.frame[index] = n << 4;
            } else {
                self.frame[index] |= n;
            }
        } else if first_of_byte {
            self.frame[index] = n;
        } else {
            self.frame[index] |= n << 4;
        }
        self.nibbles += 1;
    }

    fn push_byte(&mut self, byte: u8) {
        if self.flip_input_nibbles {
            self.push_nibble(byte >> 4);
            self.push_nibble(byte & 0xF);
        } else {
            self.push_nibble(byte & 0xF);
            self.push_nibble(byte >> 4);
        }
    }
}

impl Default for OregonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::vec::Vec;

    /// Unpack a frame back into logical nibble values, undoing the output
    /// order and bit inversion switches.
    fn unpack_nibbles(frame: &[u8], invert: bool, flip_output: bool) -> Vec<u8> {
        let mut nibbles = Vec::new();
        for &byte in frame {
            let (first, second) = if flip_output {
                (byte >> 4, byte & 0xF)
            } else {
                (byte & 0xF, byte >> 4)
            };
            for n in [first, second] {
                nibbles.push(if invert { !n & 0xF } else { n });
            }
        }
        nibbles
    }

    /// Decoded payload fields of a TH frame, reconstructed from nibbles.
    struct Decoded {
        device_id: u16,
        channel_mask: u8,
        rolling_code: u8,
        flags: u8,
        temperature: f32,
        humidity: u8,
        checksum: u8,
        checksum_valid: bool,
    }

    /// Decode the logical nibble stream of a frame produced with the given
    /// switches. `flip_input` controls how two-nibble fields recombine into
    /// bytes, mirroring the encoder's input order.
    fn decode(frame: &[u8], invert: bool, flip_input: bool, flip_output: bool) -> Decoded {
        let nibbles = unpack_nibbles(frame, invert, flip_output);

        // Skip preamble (0xF nibbles) up to the 0b1010 sync marker.
        let sync = nibbles
            .iter()
            .position(|&n| n == 0b1010)
            .expect("sync nibble present");
        let data = &nibbles[sync + 1..];

        let byte = |hi: u8, lo: u8| (hi << 4) | lo;
        let field_byte = |first: u8, second: u8| {
            if flip_input {
                byte(first, second)
            } else {
                byte(second, first)
            }
        };

        let device_id =
            ((field_byte(data[0], data[1]) as u16) << 8) | field_byte(data[2], data[3]) as u16;
        let channel_mask = data[4];
        let rolling_code = field_byte(data[5], data[6]);
        let flags = data[7];
        let magnitude =
            data[8] as f32 * 0.1 + data[9] as f32 * 1.0 + data[10] as f32 * 10.0;
        let temperature = if data[11] == 0 { magnitude } else { -magnitude };
        let humidity = data[12] + data[13] * 10;
        // data[14] is the filler nibble.
        let checksum = byte(data[16], data[15]);

        let sum: u8 = data[..15].iter().fold(0u8, |acc, &n| acc.wrapping_add(n));

        Decoded {
            device_id,
            channel_mask,
            rolling_code,
            flags,
            temperature,
            humidity,
            checksum,
            checksum_valid: sum == checksum,
        }
    }

    #[test]
    fn test_v30_frame_is_13_bytes() {
        let mut enc = OregonEncoder::new();
        let frame = enc.encode_th(0xF824, 1, 0x12, false, 21.3, 47);
        assert_eq!(frame.len(), 13);
    }

    #[test]
    fn test_v21_frame_is_12_bytes() {
        let mut enc = OregonEncoder::new();
        for id in [0x1D20, 0x1D30] {
            let frame = enc.encode_th(id, 2, 0x34, false, 5.0, 60);
            assert_eq!(frame.len(), 12);
        }
    }

    #[test]
    fn test_invalid_channel_yields_empty_frame() {
        let mut enc = OregonEncoder::new();
        for channel in [0, 4, 5, 255] {
            let frame = enc.encode_th(0xF824, channel, 0x12, false, 21.3, 47);
            assert!(frame.is_empty());
        }
    }

    #[test]
    fn test_example_reading_round_trips() {
        let mut enc = OregonEncoder::new();
        let frame = enc.encode_th(0xF824, 1, 0x12, false, 21.3, 47);
        assert_eq!(frame.len(), 13);

        let decoded = decode(frame, false, true, false);
        assert_eq!(decoded.device_id, 0xF824);
        assert_eq!(decoded.channel_mask, 0b0001);
        assert_eq!(decoded.rolling_code, 0x12);
        assert_eq!(decoded.flags, 0);
        assert_relative_eq!(decoded.temperature, 21.3, epsilon = 0.05);
        assert_eq!(decoded.humidity, 47);
        assert!(decoded.checksum_valid);
    }

    #[test]
    fn test_negative_temperature_sign_nibble() {
        let mut enc = OregonEncoder::new();
        let frame = enc.encode_th(0xF824, 1, 0x12, false, -12.7, 30);
        let decoded = decode(frame, false, true, false);
        assert_relative_eq!(decoded.temperature, -12.7, epsilon = 0.05);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let mut enc = OregonEncoder::new();
        let frame = enc.encode_th(0xF824, 1, 0x12, false, 100.2, 150);
        let decoded = decode(frame, false, true, false);
        assert_relative_eq!(decoded.temperature, 99.9, epsilon = 0.05);
        assert_eq!(decoded.humidity, 99);
        assert!(decoded.checksum_valid);
    }

    #[test]
    fn test_low_battery_flag() {
        let mut enc = OregonEncoder::new();
        let frame = enc.encode_th(0xF824, 1, 0x12, true, 21.3, 47);
        let decoded = decode(frame, false, true, false);
        assert_eq!(decoded.flags, 0x4);
    }

    #[test]
    fn test_channel_mask_bit_position() {
        let mut enc = OregonEncoder::new();
        for (channel, mask) in [(1u8, 0b0001u8), (2, 0b0010), (3, 0b0100)] {
            let frame = enc.encode_th(0xF824, channel, 0x12, false, 0.0, 0);
            let decoded = decode(frame, false, true, false);
            assert_eq!(decoded.channel_mask, mask);
        }
    }

    #[test]
    fn test_checksum_across_all_switch_combinations() {
        for invert in [false, true] {
            for flip_input in [false, true] {
                for flip_output in [false, true] {
                    let mut enc = OregonEncoder::new();
                    enc.set_invert_bits(invert);
                    enc.set_flip_input_nibbles(flip_input);
                    enc.set_flip_output_nibbles(flip_output);

                    let frame = enc.encode_th(0xF824, 3, 0xA7, true, -45.6, 88);
                    assert_eq!(frame.len(), 13);

                    let decoded = decode(frame, invert, flip_input, flip_output);
                    assert!(
                        decoded.checksum_valid,
                        "checksum failed for invert={} flip_input={} flip_output={}",
                        invert, flip_input, flip_output
                    );
                    assert_relative_eq!(decoded.temperature, -45.6, epsilon = 0.05);
                    assert_eq!(decoded.humidity, 88);
                }
            }
        }
    }

    #[test]
    fn test_rounding_to_tenths() {
        let mut enc = OregonEncoder::new();
        let frame = enc.encode_th(0xF824, 1, 0x12, false, 21.26, 50);
        let decoded = decode(frame, false, true, false);
        assert_relative_eq!(decoded.temperature, 21.3, epsilon = 0.05);
    }

    #[test]
    fn test_encoder_is_reusable() {
        let mut enc = OregonEncoder::new();
        let first_len = enc.encode_th(0xF824, 1, 0x12, false, 21.3, 47).len();
        assert_eq!(first_len, 13);
        // Invalid call resets state and yields nothing.
        assert!(enc.encode_th(0xF824, 0, 0x12, false, 21.3, 47).is_empty());
        // A subsequent valid call starts from a clean buffer.
        let frame = enc.encode_th(0xF824, 1, 0x12, false, 21.3, 47);
        assert_eq!(frame.len(), 13);
        let decoded = decode(frame, false, true, false);
        assert!(decoded.checksum_valid);
    }
}
