use std::io;

/// Builds a message borrowing from the received bytes.
pub trait Deserialize<'a>: Sized {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}
