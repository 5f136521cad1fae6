//! Host and network byte order conversion.

/// Integers that can be converted between host and network (big-endian)
/// byte order.
pub trait NetworkOrder: Copy {
    /// Host to network order.
    fn hton(self) -> Self;

    /// Network to host order.
    fn ntoh(self) -> Self;

    /// Unconditionally reverse the byte order.
    fn bswap(self) -> Self;
}

macro_rules! network_order {
    ($($int:ty),+) => {
        $(
            impl NetworkOrder for $int {
                fn hton(self) -> Self {
                    self.to_be()
                }

                fn ntoh(self) -> Self {
                    <$int>::from_be(self)
                }

                fn bswap(self) -> Self {
                    self.swap_bytes()
                }
            }
        )+
    };
}

network_order!(u16, u32, u64);
