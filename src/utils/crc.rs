/// CRC32 used by MPEG-2 PSI sections (ITU-T H.222.0 / ISO/IEC 13818-1 Annex A).
///
/// Polynomial 0x04C11DB7, initial value 0xFFFFFFFF, no reflection, no final XOR.
const CRC32_MPEG2: u32 = 0x04C11DB7;

const TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_MPEG2
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// MPEG-2 CRC32 calculator for PAT/PMT validation.
pub struct Crc32Mpeg2;

impl Crc32Mpeg2 {
    /// CRC of `data`.
    ///
    /// ```
    /// use tsdemux::utils::Crc32Mpeg2;
    ///
    /// assert_eq!(Crc32Mpeg2::calculate(&[0x01, 0x01]), 0xD66FB816);
    /// ```
    pub fn calculate(data: &[u8]) -> u32 {
        data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
            let index = ((crc >> 24) ^ byte as u32) & 0xFF;
            (crc << 8) ^ TABLE[index as usize]
        })
    }

    /// Checks a complete section whose last four bytes are its CRC32.
    ///
    /// Running the CRC over the whole section, trailer included, yields zero
    /// when the trailer is correct.
    pub fn verify(section: &[u8]) -> bool {
        section.len() >= 4 && Self::calculate(section) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_crc32_mpeg2() {
        assert_eq!(Crc32Mpeg2::calculate(&[0x01, 0x01]), 0xD66FB816);
        assert_eq!(Crc32Mpeg2::calculate(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_verify_section() {
        // PAT: one program (1) on PMT PID 0x1000
        let mut section = vec![
            0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01, 0xF0, 0x00,
        ];
        let crc = Crc32Mpeg2::calculate(&section);
        section.extend_from_slice(&crc.to_be_bytes());
        assert!(Crc32Mpeg2::verify(&section));

        section[9] ^= 0x01;
        assert!(!Crc32Mpeg2::verify(&section));
        assert!(!Crc32Mpeg2::verify(&[0x00, 0x01]));
    }
}
