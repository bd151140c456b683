/// x^15 + x^14 + x^10 + x^8 + x^7 + x^4 + x^3 + 1
const CRC15_POLYNOMIAL: u16 = 0x4599;

/// Bit-serial CRC-15/CAN, fed one destuffed logic level at a time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Crc15 {
    register: u16,
}

impl Crc15 {
    pub fn push(&mut self, bit: bool) {
        let feedback = bit ^ (self.register & 0x4000 != 0);
        self.register = (self.register << 1) & 0x7FFF;
        if feedback {
            self.register ^= CRC15_POLYNOMIAL;
        }
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> u16 {
        self.register
    }
}
