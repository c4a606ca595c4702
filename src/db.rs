//! Amplicon database: FASTA loading, nucleotide encoding, abundances.
//!
//! Records are read once at startup, encoded to the 2-bit alphabet and then
//! sorted stably by decreasing abundance. After the sort a record's position
//! in the database is its stable index: the clustering core identifies
//! records by these indices only, so "lowest unassigned index" means
//! "highest abundance, ties by input order" everywhere downstream.
//!
//! Input may be plain FASTA, gzip-compressed FASTA (sniffed from the magic
//! bytes) or stdin. Abundances ride on the header, either as a trailing
//! `_N` (default) or as a usearch-style `;size=N` annotation.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use bio::io::fasta;
use flate2::read::MultiGzDecoder;

/// ASCII letters of the encoded alphabet, in encoding order.
pub const BASES: [u8; 4] = *b"ACGT";

const INVALID: u8 = u8::MAX;

const ENCODE: [u8; 256] = build_encode_lut();

const fn build_encode_lut() -> [u8; 256] {
    let mut lut = [INVALID; 256];
    lut[b'A' as usize] = 0;
    lut[b'a' as usize] = 0;
    lut[b'C' as usize] = 1;
    lut[b'c' as usize] = 1;
    lut[b'G' as usize] = 2;
    lut[b'g' as usize] = 2;
    lut[b'T' as usize] = 3;
    lut[b't' as usize] = 3;
    lut
}

/// Decode one encoded nucleotide back to its ASCII letter.
#[inline]
pub fn decode(base: u8) -> u8 {
    BASES[base as usize]
}

/// Where the abundance annotation lives in a FASTA header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbundanceStyle {
    /// Trailing `_N` suffix, e.g. `>amplicon_113`.
    Trailing,
    /// usearch-style `;size=N`, e.g. `>amplicon;size=113`.
    Usearch,
}

#[derive(Debug)]
struct Record {
    /// Full header as read, annotation included.
    label: String,
    /// Header length without the abundance annotation.
    bare_len: usize,
    /// 2-bit encoded nucleotides.
    seq: Vec<u8>,
    abundance: u64,
}

/// The immutable, abundance-ordered set of input records.
#[derive(Debug)]
pub struct Database {
    records: Vec<Record>,
    nucleotides: u64,
    longest: usize,
}

impl Database {
    /// Load from a file path, or from stdin when `path` is `None` or `-`.
    pub fn from_path(path: Option<&Path>, style: AbundanceStyle) -> Result<Self> {
        let reader = open_input(path)?;
        Self::from_reader(reader, style)
    }

    /// Load from any reader producing FASTA text.
    pub fn from_reader<R: Read>(reader: R, style: AbundanceStyle) -> Result<Self> {
        let fasta = fasta::Reader::new(reader);
        let mut records = Vec::new();
        let mut nucleotides = 0u64;
        let mut longest = 0usize;
        let mut unannotated = 0u64;

        for (i, item) in fasta.records().enumerate() {
            let item = item.with_context(|| format!("malformed FASTA record #{}", i + 1))?;
            let label = match item.desc() {
                Some(desc) => format!("{} {}", item.id(), desc),
                None => item.id().to_string(),
            };
            if label.is_empty() {
                bail!("record #{} has an empty header", i + 1);
            }

            let mut seq = Vec::with_capacity(item.seq().len());
            for &symbol in item.seq() {
                let code = ENCODE[symbol as usize];
                if code == INVALID {
                    bail!(
                        "illegal character '{}' in sequence of record '{}'",
                        symbol as char,
                        label
                    );
                }
                seq.push(code);
            }
            if seq.is_empty() {
                bail!("record '{}' has an empty sequence", label);
            }

            let (abundance, bare_len) = match parse_abundance(&label, style)? {
                Some(found) => found,
                None => {
                    unannotated += 1;
                    (1, label.len())
                }
            };

            nucleotides += seq.len() as u64;
            longest = longest.max(seq.len());
            records.push(Record {
                label,
                bare_len,
                seq,
                abundance,
            });
        }

        if records.is_empty() {
            bail!("empty input: no sequences found");
        }
        if unannotated > 0 {
            log::warn!("{unannotated} record(s) lack an abundance annotation, assuming abundance 1");
        }

        // Stable sort: equal abundances keep their input order.
        records.sort_by(|a, b| b.abundance.cmp(&a.abundance));

        Ok(Database {
            records,
            nucleotides,
            longest,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total nucleotide count over all records.
    pub fn nucleotides(&self) -> u64 {
        self.nucleotides
    }

    /// Length of the longest sequence.
    pub fn longest(&self) -> usize {
        self.longest
    }

    /// Encoded sequence of a record.
    #[inline]
    pub fn seq(&self, id: u32) -> &[u8] {
        &self.records[id as usize].seq
    }

    #[inline]
    pub fn abundance(&self, id: u32) -> u64 {
        self.records[id as usize].abundance
    }

    /// Full header label, abundance annotation included.
    pub fn label(&self, id: u32) -> &str {
        &self.records[id as usize].label
    }

    /// Header label with the abundance annotation stripped.
    pub fn bare_label(&self, id: u32) -> &str {
        let record = &self.records[id as usize];
        &record.label[..record.bare_len]
    }
}

/// Extract the abundance and the annotation-free header length.
///
/// Returns `Ok(None)` when the header carries no annotation; zero
/// abundances are a data error, not a missing annotation.
fn parse_abundance(label: &str, style: AbundanceStyle) -> Result<Option<(u64, usize)>> {
    match style {
        AbundanceStyle::Trailing => {
            let Some((head, tail)) = label.rsplit_once('_') else {
                return Ok(None);
            };
            if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(None);
            }
            let abundance: u64 = tail
                .parse()
                .with_context(|| format!("abundance out of range in header '{label}'"))?;
            if abundance == 0 {
                bail!("zero abundance in header '{label}'");
            }
            Ok(Some((abundance, head.len())))
        }
        AbundanceStyle::Usearch => {
            let Some(start) = label.find(";size=") else {
                return Ok(None);
            };
            let digits: &str = &label[start + 6..];
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            if end == 0 {
                return Ok(None);
            }
            let abundance: u64 = digits[..end]
                .parse()
                .with_context(|| format!("abundance out of range in header '{label}'"))?;
            if abundance == 0 {
                bail!("zero abundance in header '{label}'");
            }
            Ok(Some((abundance, start)))
        }
    }
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>> {
    let raw: Box<dyn Read> = match path {
        Some(p) if p.as_os_str() != "-" => Box::new(
            File::open(p).with_context(|| format!("cannot open input file {}", p.display()))?,
        ),
        _ => Box::new(io::stdin()),
    };
    let mut buffered = BufReader::with_capacity(1 << 16, raw);

    // Sniff the gzip magic without consuming it; works for pipes too.
    let magic = buffered.fill_buf().context("cannot read input")?;
    if magic.starts_with(&[0x1f, 0x8b]) {
        Ok(Box::new(MultiGzDecoder::new(buffered)))
    } else {
        Ok(Box::new(buffered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn load(text: &str, style: AbundanceStyle) -> Result<Database> {
        Database::from_reader(Cursor::new(text.as_bytes().to_vec()), style)
    }

    #[test]
    fn trailing_abundance_is_parsed() {
        let db = load(">s1_5\nACGT\n", AbundanceStyle::Trailing).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.abundance(0), 5);
        assert_eq!(db.label(0), "s1_5");
        assert_eq!(db.bare_label(0), "s1");
        assert_eq!(db.seq(0), &[0, 1, 2, 3]);
    }

    #[test]
    fn usearch_abundance_is_parsed() {
        let db = load(">s1;size=8;extra\nacgt\n", AbundanceStyle::Usearch).unwrap();
        assert_eq!(db.abundance(0), 8);
        assert_eq!(db.bare_label(0), "s1");
        assert_eq!(db.seq(0), &[0, 1, 2, 3]);
    }

    #[test]
    fn missing_annotation_defaults_to_one() {
        let db = load(">plain\nAAAA\n", AbundanceStyle::Trailing).unwrap();
        assert_eq!(db.abundance(0), 1);
        assert_eq!(db.bare_label(0), "plain");

        let db = load(">noannot_x\nAAAA\n", AbundanceStyle::Trailing).unwrap();
        assert_eq!(db.abundance(0), 1);
        assert_eq!(db.bare_label(0), "noannot_x");
    }

    #[test]
    fn zero_abundance_is_a_data_error() {
        assert!(load(">s1_0\nAAAA\n", AbundanceStyle::Trailing).is_err());
        assert!(load(">s1;size=0\nAAAA\n", AbundanceStyle::Usearch).is_err());
    }

    #[test]
    fn illegal_symbols_are_rejected() {
        assert!(load(">s1_1\nACGN\n", AbundanceStyle::Trailing).is_err());
        assert!(load(">s1_1\nAC-T\n", AbundanceStyle::Trailing).is_err());
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(load("", AbundanceStyle::Trailing).is_err());
        assert!(load(">s1_1\n\n", AbundanceStyle::Trailing).is_err());
    }

    #[test]
    fn records_are_sorted_by_abundance_then_input_order() {
        let text = ">a_1\nAAAA\n>b_9\nCCCC\n>c_9\nGGGG\n>d_3\nTTTT\n";
        let db = load(text, AbundanceStyle::Trailing).unwrap();
        let labels: Vec<&str> = (0..db.len() as u32).map(|i| db.bare_label(i)).collect();
        assert_eq!(labels, ["b", "c", "d", "a"]);
        assert_eq!(db.abundance(0), 9);
        assert_eq!(db.abundance(3), 1);
    }

    #[test]
    fn totals_are_tracked() {
        let text = ">a_1\nAAAA\n>b_2\nCCCCCC\n";
        let db = load(text, AbundanceStyle::Trailing).unwrap();
        assert_eq!(db.nucleotides(), 10);
        assert_eq!(db.longest(), 6);
    }

    #[test]
    fn gzip_input_is_sniffed() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b">s1_4\nACGT\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let db = Database::from_reader(
            {
                // run through the sniffing reader the same way from_path does
                let mut buffered = BufReader::new(Cursor::new(compressed));
                let magic = buffered.fill_buf().unwrap();
                assert!(magic.starts_with(&[0x1f, 0x8b]));
                MultiGzDecoder::new(buffered)
            },
            AbundanceStyle::Trailing,
        )
        .unwrap();
        assert_eq!(db.abundance(0), 4);
        assert_eq!(db.seq(0), &[0, 1, 2, 3]);
    }

    #[test]
    fn decoding_matches_encoding() {
        for (code, letter) in BASES.iter().enumerate() {
            assert_eq!(decode(code as u8), *letter);
            assert_eq!(ENCODE[*letter as usize], code as u8);
            assert_eq!(ENCODE[letter.to_ascii_lowercase() as usize], code as u8);
        }
    }
}
