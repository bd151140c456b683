/// Nominal CAN bit rates the decoder recovers clocks for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Baud {
    #[default]
    #[value(name = "125000")]
    Kbps125,
    #[value(name = "250000")]
    Kbps250,
    #[value(name = "500000")]
    Kbps500,
    #[value(name = "1000000")]
    Mbps1,
}

impl Baud {
    #[inline]
    #[must_use]
    pub fn bits_per_second(self) -> u32 {
        match self {
            Baud::Kbps125 => 125_000,
            Baud::Kbps250 => 250_000,
            Baud::Kbps500 => 500_000,
            Baud::Mbps1 => 1_000_000,
        }
    }

    /// Nominal duration of one bit, in seconds
    #[inline]
    #[must_use]
    pub fn bit_time(self) -> f64 {
        1.0 / f64::from(self.bits_per_second())
    }
}

impl std::fmt::Display for Baud {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.bits_per_second())
    }
}
