/// Writes a message body into `buf`.
///
/// Implementors may hand back a trailing slice of bytes that gets written right after
/// `buf` without being copied into it.
pub trait Serialize<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]>;
}
