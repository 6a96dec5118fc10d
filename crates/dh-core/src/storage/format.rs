//! On-disk layout of a store file
//!
//! ```text
//! +--------------------+------------------------------------------+
//! | header (16 bytes)  | commit frame | commit frame | ...        |
//! +--------------------+------------------------------------------+
//!
//! header = "DHSTORE\0" | version: u32 LE | reserved: [0; 4]
//! frame  = payload_len: u32 LE | sha256(payload_len)[..4] | payload (CBOR `Commit`) | sha256(payload)
//! ```
//!
//! Frames are only ever appended. A frame is committed once it is fully on
//! disk with a matching checksum; anything short of that at the end of the
//! file is the remains of an interrupted commit. The length carries its own
//! checksum so a damaged length can never make committed frames after it
//! look like an unfinished tail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Magic bytes identifying a store file
pub const MAGIC: &[u8; 8] = b"DHSTORE\0";

/// Current file format version
pub const FORMAT_VERSION: u32 = 1;

/// Size of the file header in bytes
pub const HEADER_LEN: usize = 16;

/// Largest payload a single commit may carry
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

const LEN_PREFIX: usize = 4;
const LEN_CHECK: usize = 4;
const FRAME_HEADER: usize = LEN_PREFIX + LEN_CHECK;
const CHECKSUM_LEN: usize = 32;

/// Encode the file header for the current format version
pub fn encode_header() -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..8].copy_from_slice(MAGIC);
    header[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header
}

/// Validate a file header, returning a description of the problem if any
pub fn check_header(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!(
            "file is {} bytes, shorter than the {}-byte header",
            bytes.len(),
            HEADER_LEN
        ));
    }
    if &bytes[..8] != MAGIC {
        return Err("missing store magic bytes".to_string());
    }
    let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if version != FORMAT_VERSION {
        return Err(format!(
            "unsupported format version {} (expected {})",
            version, FORMAT_VERSION
        ));
    }
    Ok(())
}

/// A single mutation recorded in a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    CreateBucket {
        #[serde(with = "serde_bytes")]
        bucket: Vec<u8>,
    },
    Put {
        #[serde(with = "serde_bytes")]
        bucket: Vec<u8>,
        #[serde(with = "serde_bytes")]
        key: Vec<u8>,
        #[serde(with = "serde_bytes")]
        value: Vec<u8>,
    },
    Delete {
        #[serde(with = "serde_bytes")]
        bucket: Vec<u8>,
        #[serde(with = "serde_bytes")]
        key: Vec<u8>,
    },
}

impl Op {
    /// Bucket the operation applies to
    pub fn bucket(&self) -> &[u8] {
        match self {
            Op::CreateBucket { bucket } | Op::Put { bucket, .. } | Op::Delete { bucket, .. } => {
                bucket
            }
        }
    }
}

/// Everything one read-write transaction changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub txid: u64,
    pub committed_at: DateTime<Utc>,
    pub ops: Vec<Op>,
}

/// Encode a commit as a length-prefixed, checksummed frame
pub fn encode_frame(commit: &Commit) -> Result<Vec<u8>, String> {
    let mut payload = Vec::new();
    ciborium::into_writer(commit, &mut payload).map_err(|e| e.to_string())?;

    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(format!("commit of {} bytes is too large", payload.len()));
    }
    let len = (payload.len() as u32).to_le_bytes();

    let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len() + CHECKSUM_LEN);
    frame.extend_from_slice(&len);
    frame.extend_from_slice(&length_check(&len));
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&Sha256::digest(&payload));
    Ok(frame)
}

/// Result of scanning the frames that follow the header
#[derive(Debug)]
pub struct Replay {
    /// Committed transactions, in commit order
    pub commits: Vec<Commit>,
    /// File offset of each commit's frame
    pub offsets: Vec<u64>,
    /// Length of the file up to the end of the last good frame
    pub valid_len: u64,
    /// Whether an interrupted frame was found at the end of the file
    pub torn: bool,
}

/// A frame that failed validation with more data after it
#[derive(Debug, PartialEq, Eq)]
pub struct FrameError {
    pub offset: u64,
    pub details: String,
}

/// Decode all frames in `body`, which starts at `base_offset` in the file
pub fn read_frames(body: &[u8], base_offset: u64) -> Result<Replay, FrameError> {
    let mut commits: Vec<Commit> = Vec::new();
    let mut offsets = Vec::new();
    let mut pos = 0usize;
    let mut torn = false;

    while pos < body.len() {
        let offset = base_offset + pos as u64;
        let remaining = body.len() - pos;
        if remaining < FRAME_HEADER {
            torn = true;
            break;
        }

        let len_bytes = [body[pos], body[pos + 1], body[pos + 2], body[pos + 3]];
        if length_check(&len_bytes) != body[pos + LEN_PREFIX..pos + FRAME_HEADER] {
            // Preallocated but never written
            if body[pos..].iter().all(|&b| b == 0) {
                torn = true;
                break;
            }
            return Err(FrameError {
                offset,
                details: "frame length checksum mismatch".to_string(),
            });
        }

        let payload_len = u32::from_le_bytes(len_bytes) as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(FrameError {
                offset,
                details: format!("frame length {} exceeds the maximum", payload_len),
            });
        }

        let end = pos + FRAME_HEADER + payload_len + CHECKSUM_LEN;
        if end > body.len() {
            torn = true;
            break;
        }

        let payload = &body[pos + FRAME_HEADER..end - CHECKSUM_LEN];
        let checksum = &body[end - CHECKSUM_LEN..end];
        if Sha256::digest(payload).as_slice() != checksum {
            if end == body.len() {
                torn = true;
                break;
            }
            return Err(FrameError {
                offset,
                details: "checksum mismatch".to_string(),
            });
        }

        let commit: Commit = ciborium::from_reader(payload).map_err(|e| FrameError {
            offset,
            details: format!("undecodable commit: {}", e),
        })?;

        if let Some(last) = commits.last() {
            if commit.txid <= last.txid {
                return Err(FrameError {
                    offset,
                    details: format!(
                        "transaction id {} does not follow {}",
                        commit.txid, last.txid
                    ),
                });
            }
        }

        commits.push(commit);
        offsets.push(offset);
        pos = end;
    }

    Ok(Replay {
        commits,
        offsets,
        valid_len: base_offset + pos as u64,
        torn,
    })
}

fn length_check(len: &[u8; LEN_PREFIX]) -> [u8; LEN_CHECK] {
    let digest = Sha256::digest(len);
    [digest[0], digest[1], digest[2], digest[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(txid: u64, ops: Vec<Op>) -> Commit {
        Commit {
            txid,
            committed_at: Utc::now(),
            ops,
        }
    }

    fn put(key: &str, value: &str) -> Op {
        Op::Put {
            bucket: b"dirs".to_vec(),
            key: key.as_bytes().to_vec(),
            value: value.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_header_validation() {
        let header = encode_header();
        assert!(check_header(&header).is_ok());

        assert!(check_header(b"short").unwrap_err().contains("shorter"));

        let mut bad_magic = header;
        bad_magic[0] = b'X';
        assert!(check_header(&bad_magic).unwrap_err().contains("magic"));

        let mut bad_version = header;
        bad_version[8] = 9;
        assert!(check_header(&bad_version).unwrap_err().contains("version 9"));
    }

    #[test]
    fn test_frames_decode_in_order() {
        let first = commit(1, vec![Op::CreateBucket { bucket: b"dirs".to_vec() }]);
        let second = commit(2, vec![put("home", "/home/alice")]);

        let mut body = encode_frame(&first).unwrap();
        body.extend(encode_frame(&second).unwrap());

        let replay = read_frames(&body, HEADER_LEN as u64).unwrap();
        assert!(!replay.torn);
        assert_eq!(replay.commits, vec![first.clone(), second]);
        assert_eq!(
            replay.offsets,
            vec![
                HEADER_LEN as u64,
                (HEADER_LEN + encode_frame(&first).unwrap().len()) as u64
            ]
        );
        assert_eq!(replay.valid_len, (HEADER_LEN + body.len()) as u64);
    }

    #[test]
    fn test_truncated_tail_is_torn() {
        let first = encode_frame(&commit(1, vec![put("a", "/a")])).unwrap();
        let second = encode_frame(&commit(2, vec![put("b", "/b")])).unwrap();

        for cut in [1, 3, 10, second.len() - 1] {
            let mut body = first.clone();
            body.extend_from_slice(&second[..cut]);

            let replay = read_frames(&body, 0).unwrap();
            assert!(replay.torn, "cut at {} should be torn", cut);
            assert_eq!(replay.commits.len(), 1);
            assert_eq!(replay.valid_len, first.len() as u64);
        }
    }

    #[test]
    fn test_bad_checksum_at_tail_is_torn() {
        let mut body = encode_frame(&commit(1, vec![put("a", "/a")])).unwrap();
        let last = body.len() - 1;
        body[last] ^= 0xff;

        let replay = read_frames(&body, 0).unwrap();
        assert!(replay.torn);
        assert!(replay.commits.is_empty());
        assert_eq!(replay.valid_len, 0);
    }

    #[test]
    fn test_bad_checksum_mid_file_is_corruption() {
        let mut body = encode_frame(&commit(1, vec![put("a", "/a")])).unwrap();
        body[6] ^= 0xff;
        body.extend(encode_frame(&commit(2, vec![put("b", "/b")])).unwrap());

        let err = read_frames(&body, 16).unwrap_err();
        assert_eq!(err.offset, 16);
        assert!(err.details.contains("checksum"));
    }

    #[test]
    fn test_damaged_length_mid_file_is_corruption() {
        let first = encode_frame(&commit(1, vec![put("a", "/a")])).unwrap();
        let mut body = first.clone();
        body.extend(encode_frame(&commit(2, vec![put("b", "/b")])).unwrap());
        body.extend(encode_frame(&commit(3, vec![put("c", "/c")])).unwrap());

        // Length now points past the end of the file
        body[first.len() + 3] ^= 0x40;

        let err = read_frames(&body, 0).unwrap_err();
        assert_eq!(err.offset, first.len() as u64);
        assert!(err.details.contains("length"));
    }

    #[test]
    fn test_oversized_length_is_corruption() {
        let len = ((MAX_PAYLOAD_LEN + 1) as u32).to_le_bytes();
        let mut body = len.to_vec();
        body.extend_from_slice(&length_check(&len));
        body.extend_from_slice(&[0u8; 64]);

        let err = read_frames(&body, 0).unwrap_err();
        assert!(err.details.contains("exceeds"));
    }

    #[test]
    fn test_zero_filled_tail_is_torn() {
        let mut body = encode_frame(&commit(1, vec![put("a", "/a")])).unwrap();
        let good = body.len();
        body.extend_from_slice(&[0u8; 40]);

        let replay = read_frames(&body, 0).unwrap();
        assert!(replay.torn);
        assert_eq!(replay.commits.len(), 1);
        assert_eq!(replay.valid_len, good as u64);
    }

    #[test]
    fn test_non_increasing_txid_is_corruption() {
        let mut body = encode_frame(&commit(2, vec![put("a", "/a")])).unwrap();
        let first_len = body.len();
        body.extend(encode_frame(&commit(2, vec![put("b", "/b")])).unwrap());

        let err = read_frames(&body, 0).unwrap_err();
        assert_eq!(err.offset, first_len as u64);
    }
}
