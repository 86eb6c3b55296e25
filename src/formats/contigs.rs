//! Contig-size providers.
//!
//! The partition pipeline needs an ordered list of `(contig_name,
//! length_bp)` pairs matching the BAI's reference slots. Two providers are
//! supported: a two-column tab-separated text file, and the reference
//! dictionary of a BAM file's binary header.

use crate::error::{IndexToolsError, Result};
use flate2::read::MultiGzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// BAM file magic bytes (inside the BGZF stream).
const BAM_MAGIC: &[u8; 4] = b"BAM\x01";

/// Ordered list of reference sequences with name lookup.
///
/// Order matches the source (file line order or BAM header order), which
/// in turn must match the BAI's reference slots.
#[derive(Debug, Clone)]
pub struct References {
    list: Vec<(String, u64)>,
    by_name: HashMap<String, usize>,
}

impl References {
    /// Build from ordered `(name, length)` pairs.
    pub fn new(list: Vec<(String, u64)>) -> Self {
        let by_name = list
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
        References { list, by_name }
    }

    /// Number of references.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Name of the reference in slot `idx`.
    pub fn name(&self, idx: usize) -> Option<&str> {
        self.list.get(idx).map(|(name, _)| name.as_str())
    }

    /// Length in bp of the reference in slot `idx`.
    pub fn length(&self, idx: usize) -> Option<u64> {
        self.list.get(idx).map(|&(_, len)| len)
    }

    /// Slot index of a reference name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Iterate over `(name, length)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.list.iter().map(|(name, len)| (name.as_str(), *len))
    }

    /// Load references from a tab-separated file with two columns:
    /// `contig_name<TAB>length_bp`. Blank lines are ignored.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);

        let mut list = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let mut fields = line.split('\t');
            let name = fields.next().unwrap_or("");
            let length = fields.next().ok_or_else(|| IndexToolsError::InvalidFormat {
                format: "contig sizes",
                msg: format!("line {}: expected two tab-separated columns", line_no + 1),
            })?;

            if name.is_empty() {
                return Err(IndexToolsError::InvalidFormat {
                    format: "contig sizes",
                    msg: format!("line {}: empty contig name", line_no + 1),
                });
            }

            let length: u64 = length.trim().parse().map_err(|_| {
                IndexToolsError::InvalidFormat {
                    format: "contig sizes",
                    msg: format!("line {}: invalid length '{}'", line_no + 1, length),
                }
            })?;

            list.push((name.to_string(), length));
        }

        Ok(References::new(list))
    }

    /// Load references from the binary header of a BAM file.
    ///
    /// Only the header is read: magic, SAM header text (skipped), then the
    /// reference dictionary. BGZF blocks are concatenated gzip members, so
    /// a multi-member decoder reads the stream sequentially.
    pub fn from_bam<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(MultiGzDecoder::new(file));
        Self::from_bam_header(&mut reader)
    }

    /// Parse the reference dictionary from an uncompressed BAM header stream.
    pub fn from_bam_header<R: Read>(reader: &mut R) -> Result<Self> {
        let invalid = |msg: String| IndexToolsError::InvalidFormat {
            format: "BAM header",
            msg,
        };

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|_| invalid("unexpected end of file reading magic".into()))?;
        if &magic != BAM_MAGIC {
            return Err(invalid(format!(
                "invalid magic: expected {:?}, got {:?}",
                BAM_MAGIC, magic
            )));
        }

        let l_text = read_i32(reader).map_err(|_| invalid("truncated header".into()))?;
        if l_text < 0 {
            return Err(invalid(format!("negative SAM header length: {}", l_text)));
        }
        let mut text = std::io::Read::take(&mut *reader, l_text as u64);
        let skipped = std::io::copy(&mut text, &mut std::io::sink())?;
        if skipped != l_text as u64 {
            return Err(invalid("truncated SAM header text".into()));
        }

        let n_ref = read_i32(reader).map_err(|_| invalid("truncated header".into()))?;
        if n_ref < 0 {
            return Err(invalid(format!("negative reference count: {}", n_ref)));
        }

        let mut list = Vec::with_capacity(n_ref as usize);
        for _ in 0..n_ref {
            let l_name = read_i32(reader).map_err(|_| invalid("truncated reference".into()))?;
            if l_name <= 0 {
                return Err(invalid(format!("invalid reference name length: {}", l_name)));
            }

            let mut name_buf = vec![0u8; l_name as usize];
            reader
                .read_exact(&mut name_buf)
                .map_err(|_| invalid("truncated reference name".into()))?;
            // name is NUL-terminated
            if name_buf.pop() != Some(0) {
                return Err(invalid("reference name missing NUL terminator".into()));
            }
            let name = String::from_utf8(name_buf)
                .map_err(|e| invalid(format!("reference name is not UTF-8: {}", e)))?;

            let l_ref = read_i32(reader).map_err(|_| invalid("truncated reference".into()))?;
            if l_ref < 0 {
                return Err(invalid(format!(
                    "negative length for reference '{}': {}",
                    name, l_ref
                )));
            }

            list.push((name, l_ref as u64));
        }

        Ok(References::new(list))
    }
}

fn read_i32<R: Read>(reader: &mut R) -> std::io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}
