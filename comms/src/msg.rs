use std::{borrow::Cow, io};

use crate::{Deserialize, Serialize};

type Header = u64;
const HEADER_SIZE: usize = size_of::<Header>();

/// Bytes a chunk frame spends before its values: the kind and four `u64` fields.
pub const CHUNK_HEADER_LEN: usize = HEADER_SIZE + 4 * size_of::<u64>();

const ERR: Header = 0;
const CONTROL: Header = 1;
const CHUNK: Header = 2;
const RESULTS: Header = 3;

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload<'a> {
    /// A batch of contiguous rows out of a block of `rows` x `cols` values.
    ///
    /// The batch holds rows `first..first + batch` of the block. A block too big for a
    /// single frame travels as several batches in row order.
    Chunk {
        rows: usize,
        cols: usize,
        first: usize,
        batch: usize,
        data: &'a [f64],
    },
    /// One scalar result per evaluated row.
    Results(&'a [f64]),
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Join { rank: usize, size: usize },
    Broadcast(serde_json::Value),
    BarrierEnter,
    BarrierRelease,
}

/// The application layer message for the entire system.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// A short name for the message kind, meant for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::Join { .. }) => "control/join",
            Msg::Control(Command::Broadcast(_)) => "control/broadcast",
            Msg::Control(Command::BarrierEnter) => "control/barrier_enter",
            Msg::Control(Command::BarrierRelease) => "control/barrier_release",
            Msg::Data(Payload::Chunk { .. }) => "data/chunk",
            Msg::Data(Payload::Results(_)) => "data/results",
            Msg::Err(_) => "err",
        }
    }

    fn invalid_data<T>(detail: String) -> io::Result<T> {
        Err(io::Error::new(io::ErrorKind::InvalidData, detail))
    }

    fn read_u64(buf: &[u8], at: usize) -> io::Result<u64> {
        match buf.get(at..at + 8) {
            // SAFETY: `get` returned exactly 8 bytes.
            Some(bytes) => Ok(u64::from_be_bytes(bytes.try_into().unwrap())),
            None => Self::invalid_data(format!(
                "buffer of {} bytes is too small to read a u64 at {at}",
                buf.len()
            )),
        }
    }

    fn cast_values(bytes: &[u8]) -> io::Result<&[f64]> {
        bytemuck::try_cast_slice(bytes).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid f64 payload of {} bytes: {e}", bytes.len()),
            )
        })
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]> {
        match self {
            Msg::Err(detail) => {
                buf.extend_from_slice(&ERR.to_be_bytes());
                Some(detail.as_bytes())
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL.to_be_bytes());

                // SAFETY: Serialize impl for `Command` is derived and `Value` maps
                //         always have string keys.
                serde_json::to_writer(buf, cmd).unwrap();
                None
            }
            Msg::Data(Payload::Chunk {
                rows,
                cols,
                first,
                batch,
                data,
            }) => {
                buf.extend_from_slice(&CHUNK.to_be_bytes());
                for field in [rows, cols, first, batch] {
                    buf.extend_from_slice(&(*field as u64).to_be_bytes());
                }
                Some(bytemuck::cast_slice(*data))
            }
            Msg::Data(Payload::Results(values)) => {
                buf.extend_from_slice(&RESULTS.to_be_bytes());
                Some(bytemuck::cast_slice(*values))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        let kind = Self::read_u64(buf, 0)?;
        let rest = &buf[HEADER_SIZE..];

        match kind {
            ERR => {
                let detail = std::str::from_utf8(rest)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

                Ok(Self::Err(Cow::Borrowed(detail)))
            }
            CONTROL => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            CHUNK => {
                let rows = Self::read_u64(rest, 0)? as usize;
                let cols = Self::read_u64(rest, 8)? as usize;
                let first = Self::read_u64(rest, 16)? as usize;
                let batch = Self::read_u64(rest, 24)? as usize;
                let data = Self::cast_values(&rest[32..])?;

                if batch.checked_mul(cols) != Some(data.len()) {
                    return Self::invalid_data(format!(
                        "batch shape {batch}x{cols} doesn't match its {} values",
                        data.len()
                    ));
                }

                match first.checked_add(batch) {
                    Some(end) if end <= rows && (batch > 0 || rows == 0) => {}
                    _ => {
                        return Self::invalid_data(format!(
                            "batch of {batch} rows at {first} doesn't fit a chunk of {rows} rows"
                        ));
                    }
                }

                Ok(Self::Data(Payload::Chunk {
                    rows,
                    cols,
                    first,
                    batch,
                    data,
                }))
            }
            RESULTS => {
                let values = Self::cast_values(rest)?;
                Ok(Self::Data(Payload::Results(values)))
            }
            other => Self::invalid_data(format!("received an invalid kind header {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serializes `msg` into an 8 byte aligned buffer, the way the receiver lays it out.
    fn frame(msg: &Msg<'_>) -> Vec<u64> {
        let mut body = Vec::new();
        let tail = msg.serialize(&mut body);
        body.extend_from_slice(tail.unwrap_or_default());

        let mut aligned = vec![0u64; body.len().div_ceil(8)];
        bytemuck::cast_slice_mut::<u64, u8>(&mut aligned)[..body.len()].copy_from_slice(&body);
        aligned
    }

    fn bytes(aligned: &[u64], len: usize) -> &[u8] {
        &bytemuck::cast_slice(aligned)[..len]
    }

    #[test]
    fn chunk_keeps_shape_and_values() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let msg = Msg::Data(Payload::Chunk {
            rows: 5,
            cols: 2,
            first: 1,
            batch: 3,
            data: &data,
        });

        let aligned = frame(&msg);
        let decoded = Msg::deserialize(bytes(&aligned, CHUNK_HEADER_LEN + 48)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn empty_chunk_is_valid() {
        let msg = Msg::Data(Payload::Chunk {
            rows: 0,
            cols: 4,
            first: 0,
            batch: 0,
            data: &[],
        });

        let aligned = frame(&msg);
        let decoded = Msg::deserialize(bytes(&aligned, CHUNK_HEADER_LEN)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn batch_past_the_end_of_its_chunk_is_rejected() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let msg = Msg::Data(Payload::Chunk {
            rows: 3,
            cols: 2,
            first: 2,
            batch: 2,
            data: &data,
        });

        let aligned = frame(&msg);
        let err = Msg::deserialize(bytes(&aligned, CHUNK_HEADER_LEN + 32)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn empty_batch_of_a_non_empty_chunk_is_rejected() {
        let msg = Msg::Data(Payload::Chunk {
            rows: 3,
            cols: 2,
            first: 0,
            batch: 0,
            data: &[],
        });

        let aligned = frame(&msg);
        let err = Msg::deserialize(bytes(&aligned, CHUNK_HEADER_LEN)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn results_keep_non_finite_values() {
        let values = [0.5, f64::NAN, f64::INFINITY];
        let msg = Msg::Data(Payload::Results(&values));

        let aligned = frame(&msg);
        let Msg::Data(Payload::Results(decoded)) = Msg::deserialize(bytes(&aligned, 32)).unwrap()
        else {
            panic!("expected results");
        };

        assert_eq!(decoded[0], 0.5);
        assert!(decoded[1].is_nan());
        assert_eq!(decoded[2], f64::INFINITY);
    }

    #[test]
    fn chunk_with_wrong_shape_is_rejected() {
        let data = [1.0, 2.0, 3.0];
        let msg = Msg::Data(Payload::Chunk {
            rows: 2,
            cols: 2,
            first: 0,
            batch: 2,
            data: &data,
        });

        let aligned = frame(&msg);
        let err = Msg::deserialize(bytes(&aligned, CHUNK_HEADER_LEN + 24)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let aligned = [42u64.to_be()];
        let err = Msg::deserialize(bytes(&aligned, 8)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn control_broadcast_carries_json() {
        let value = serde_json::json!({ "counts": [3, 3, 2] });
        let msg = Msg::Control(Command::Broadcast(value));

        let mut body = Vec::new();
        assert!(msg.serialize(&mut body).is_none());

        let decoded = Msg::deserialize(&body).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.kind(), "control/broadcast");
    }
}
