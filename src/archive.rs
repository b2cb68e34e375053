// Store-only ZIP writer.
//
// Layout: for each entry a 30-byte local header, the name and the raw bytes;
// then one 46-byte central directory record plus name per entry; then the
// 22-byte end record. All multi-byte fields are little endian. Sizes and
// offsets are 32-bit, counts and name lengths 16-bit, and every limit is checked
// before the first byte is written.

use crate::error::VdkitError;
use rayon::prelude::*;
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const END_RECORD_SIG: u32 = 0x0605_4b50;
pub const LOCAL_HEADER_LEN: u64 = 30;
pub const CENTRAL_HEADER_LEN: u64 = 46;
pub const END_RECORD_LEN: u64 = 22;
const VERSION: u16 = 20;
const METHOD_STORE: u16 = 0;
const FLAG_UTF8: u16 = 1 << 11;
const CRC_POLY: u32 = 0xEDB8_8320;

static CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { CRC_POLY ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// CRC-32 (reflected, polynomial 0xEDB88320) as used by ZIP.
pub fn crc32(data: &[u8]) -> u32 {
    let mut c = !0u32;
    for &byte in data {
        c = (c >> 8) ^ CRC_TABLE[((c ^ byte as u32) & 0xFF) as usize];
    }
    !c
}

/// Wall-clock time as stored in DOS date/time fields (2-second resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArchiveTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl ArchiveTimestamp {
    pub const MIN: ArchiveTimestamp = ArchiveTimestamp::new(1980, 1, 1, 0, 0, 0);
    pub const MAX: ArchiveTimestamp = ArchiveTimestamp::new(2107, 12, 31, 23, 59, 58);

    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Current UTC time. A clock before the Unix epoch maps to [`Self::MIN`].
    pub fn now_utc() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => Self::from_unix_seconds(elapsed.as_secs().min(i64::MAX as u64) as i64),
            Err(_) => Self::MIN,
        }
    }

    pub fn from_unix_seconds(secs: i64) -> Self {
        let days = secs.div_euclid(86_400);
        let rem = secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);
        if year < 1980 {
            return Self::MIN;
        }
        if year > 2107 {
            return Self::MAX;
        }
        Self::new(
            year as u16,
            month,
            day,
            (rem / 3600) as u8,
            (rem % 3600 / 60) as u8,
            (rem % 60) as u8,
        )
    }

    /// Clamps into the representable range 1980-01-01 ..= 2107-12-31 23:59:58.
    pub fn clamped(self) -> Self {
        if self.year < 1980 {
            return Self::MIN;
        }
        if self.year > 2107 {
            return Self::MAX;
        }
        Self::new(
            self.year,
            self.month.clamp(1, 12),
            self.day.clamp(1, 31),
            self.hour.min(23),
            self.minute.min(59),
            self.second.min(59),
        )
    }

    /// `(time, date)`: 5/6/5-bit hour:minute:second/2 and 7/4/5-bit
    /// (year-1980):month:day.
    pub fn to_dos(self) -> (u16, u16) {
        let t = self.clamped();
        let time = (t.hour as u16) << 11 | (t.minute as u16) << 5 | (t.second as u16 / 2);
        let date = (t.year - 1980) << 9 | (t.month as u16) << 5 | t.day as u16;
        (time, date)
    }
}

// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: String,
    pub data: Vec<u8>,
    pub timestamp: Option<ArchiveTimestamp>,
}

impl ArchiveFile {
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: ArchiveTimestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// One written entry. `offset` is the position of its local header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub size: u32,
    pub crc32: u32,
    pub timestamp: ArchiveTimestamp,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub bytes: Vec<u8>,
    pub entries: Vec<ArchiveEntry>,
}

impl Archive {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sha256_hex(&self) -> String {
        crate::sha256_hex(&self.bytes)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    files: Vec<ArchiveFile>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> &mut Self {
        self.files.push(ArchiveFile::new(path, data));
        self
    }

    pub fn add_file(&mut self, file: ArchiveFile) -> &mut Self {
        self.files.push(file);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn build(&self) -> Result<Archive, VdkitError> {
        build_archive(&self.files)
    }
}

#[derive(Debug)]
struct Layout {
    offsets: Vec<u32>,
    central_offset: u32,
    central_len: u32,
    total_len: u64,
}

fn plan_layout(entries: &[(&str, u64)]) -> Result<Layout, VdkitError> {
    if entries.len() > u16::MAX as usize {
        return Err(VdkitError::size_overflow("entry count", entries.len() as u64));
    }
    let limit = u32::MAX as u64;
    let mut offsets = Vec::with_capacity(entries.len());
    let mut cursor: u64 = 0;
    let mut central: u64 = 0;

    for (name, size) in entries {
        let name_len = name.len() as u64;
        if name_len > u16::MAX as u64 {
            return Err(VdkitError::size_overflow(
                format!("name length of entry {}", truncate_for_message(name)),
                name_len,
            ));
        }
        if *size > limit {
            return Err(VdkitError::size_overflow(format!("entry {}", name), *size));
        }
        if cursor > limit {
            return Err(VdkitError::size_overflow(format!("offset of entry {}", name), cursor));
        }
        offsets.push(cursor as u32);
        cursor += LOCAL_HEADER_LEN + name_len + size;
        central += CENTRAL_HEADER_LEN + name_len;
    }

    if cursor > limit {
        return Err(VdkitError::size_overflow("central directory offset", cursor));
    }
    if central > limit {
        return Err(VdkitError::size_overflow("central directory", central));
    }
    let total_len = cursor + central + END_RECORD_LEN;
    if total_len > limit {
        return Err(VdkitError::size_overflow("archive", total_len));
    }

    Ok(Layout {
        offsets,
        central_offset: cursor as u32,
        central_len: central as u32,
        total_len,
    })
}

fn truncate_for_message(name: &str) -> String {
    name.chars().take(32).collect::<String>() + "..."
}

/// Serializes `files` in order into a store-only archive.
///
/// Backslashes in paths become `/`. Paths must be non-empty and unique after
/// that normalisation. Entries without a timestamp get the build time, read
/// once per call.
pub fn build_archive(files: &[ArchiveFile]) -> Result<Archive, VdkitError> {
    let names: Vec<String> = files.iter().map(|f| f.path.replace('\\', "/")).collect();
    let mut seen = HashSet::with_capacity(names.len());
    for name in &names {
        if name.is_empty() {
            return Err(VdkitError::InvalidConfiguration(
                "archive entry with an empty path".to_string(),
            ));
        }
        if !seen.insert(name.as_str()) {
            return Err(VdkitError::DuplicateEntry(name.clone()));
        }
    }

    let plan: Vec<(&str, u64)> = names
        .iter()
        .zip(files)
        .map(|(name, f)| (name.as_str(), f.data.len() as u64))
        .collect();
    let layout = plan_layout(&plan)?;

    let now = files
        .iter()
        .any(|f| f.timestamp.is_none())
        .then(ArchiveTimestamp::now_utc);
    let crcs: Vec<u32> = files.par_iter().map(|f| crc32(&f.data)).collect();

    let mut out = Vec::with_capacity(layout.total_len as usize);
    let mut entries = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        let name = &names[i];
        let timestamp = file
            .timestamp
            .or(now)
            .unwrap_or(ArchiveTimestamp::MIN)
            .clamped();
        let entry = ArchiveEntry {
            path: name.clone(),
            size: file.data.len() as u32,
            crc32: crcs[i],
            timestamp,
            offset: layout.offsets[i],
        };
        debug_assert_eq!(out.len() as u64, entry.offset as u64);
        write_local_header(&mut out, &entry);
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&file.data);
        entries.push(entry);
    }

    for entry in &entries {
        write_central_header(&mut out, entry);
        out.extend_from_slice(entry.path.as_bytes());
    }

    let count = entries.len() as u16;
    put_u32(&mut out, END_RECORD_SIG);
    put_u16(&mut out, 0); // this disk
    put_u16(&mut out, 0); // disk with central directory
    put_u16(&mut out, count);
    put_u16(&mut out, count);
    put_u32(&mut out, layout.central_len);
    put_u32(&mut out, layout.central_offset);
    put_u16(&mut out, 0); // comment length

    log::debug!(
        target: "vdkit::archive",
        "built archive: {} entries, {} bytes",
        entries.len(),
        out.len()
    );
    Ok(Archive {
        bytes: out,
        entries,
    })
}

fn flags_for(name: &str) -> u16 {
    if name.is_ascii() { 0 } else { FLAG_UTF8 }
}

fn write_local_header(out: &mut Vec<u8>, entry: &ArchiveEntry) {
    let (time, date) = entry.timestamp.to_dos();
    put_u32(out, LOCAL_HEADER_SIG);
    put_u16(out, VERSION);
    put_u16(out, flags_for(&entry.path));
    put_u16(out, METHOD_STORE);
    put_u16(out, time);
    put_u16(out, date);
    put_u32(out, entry.crc32);
    put_u32(out, entry.size);
    put_u32(out, entry.size);
    put_u16(out, entry.path.len() as u16);
    put_u16(out, 0); // extra length
}

fn write_central_header(out: &mut Vec<u8>, entry: &ArchiveEntry) {
    let (time, date) = entry.timestamp.to_dos();
    put_u32(out, CENTRAL_HEADER_SIG);
    put_u16(out, VERSION); // made by
    put_u16(out, VERSION); // needed
    put_u16(out, flags_for(&entry.path));
    put_u16(out, METHOD_STORE);
    put_u16(out, time);
    put_u16(out, date);
    put_u32(out, entry.crc32);
    put_u32(out, entry.size);
    put_u32(out, entry.size);
    put_u16(out, entry.path.len() as u16);
    put_u16(out, 0); // extra length
    put_u16(out, 0); // comment length
    put_u16(out, 0); // disk number start
    put_u16(out, 0); // internal attributes
    put_u32(out, 0); // external attributes
    put_u32(out, entry.offset);
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FIXED: ArchiveTimestamp = ArchiveTimestamp::new(2024, 5, 17, 13, 45, 31);

    fn bitwise_crc32(data: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFFu32;
        for &byte in data {
            crc ^= byte as u32;
            for _ in 0..8 {
                let mask = (crc & 1).wrapping_neg();
                crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
            }
        }
        !crc
    }

    fn u16_at(b: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([b[at], b[at + 1]])
    }

    fn u32_at(b: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
    }

    // Minimal reader that trusts only the end record and the central directory.
    fn read_archive(bytes: &[u8]) -> Vec<(String, Vec<u8>, u32)> {
        let end = bytes.len() - END_RECORD_LEN as usize;
        assert_eq!(u32_at(bytes, end), END_RECORD_SIG);
        let count = u16_at(bytes, end + 10) as usize;
        assert_eq!(u16_at(bytes, end + 8) as usize, count);
        let cd_len = u32_at(bytes, end + 12) as usize;
        let mut at = u32_at(bytes, end + 16) as usize;
        assert_eq!(at + cd_len, end);

        let mut out = Vec::new();
        for _ in 0..count {
            assert_eq!(u32_at(bytes, at), CENTRAL_HEADER_SIG);
            assert_eq!(u16_at(bytes, at + 10), 0);
            let crc = u32_at(bytes, at + 16);
            let size = u32_at(bytes, at + 20) as usize;
            assert_eq!(u32_at(bytes, at + 24) as usize, size);
            let name_len = u16_at(bytes, at + 28) as usize;
            let local = u32_at(bytes, at + 42) as usize;
            let name = String::from_utf8(bytes[at + 46..at + 46 + name_len].to_vec()).unwrap();

            assert_eq!(u32_at(bytes, local), LOCAL_HEADER_SIG);
            assert_eq!(u32_at(bytes, local + 14), crc);
            let local_name_len = u16_at(bytes, local + 26) as usize;
            let extra = u16_at(bytes, local + 28) as usize;
            let data_start = local + 30 + local_name_len + extra;
            let data = bytes[data_start..data_start + size].to_vec();
            out.push((name, data, crc));
            at += 46 + name_len;
        }
        out
    }

    #[test]
    fn crc_matches_reference_values() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
        for sample in [&b"hi"[..], b"a", b"The quick brown fox", &[0u8, 255, 128, 7]] {
            assert_eq!(crc32(sample), bitwise_crc32(sample));
        }
    }

    #[test]
    fn single_entry_round_trips() {
        let archive = build_archive(&[ArchiveFile::new("a.txt", "hi").with_timestamp(FIXED)]).unwrap();
        assert_eq!(archive.entries[0].crc32, bitwise_crc32(b"hi"));
        let read = read_archive(&archive.bytes);
        assert_eq!(read, vec![("a.txt".to_string(), b"hi".to_vec(), bitwise_crc32(b"hi"))]);
        assert_eq!(
            archive.len() as u64,
            (LOCAL_HEADER_LEN + 5 + 2) + (CENTRAL_HEADER_LEN + 5) + END_RECORD_LEN
        );
    }

    #[test]
    fn length_is_sum_of_records() {
        let files = vec![
            ArchiveFile::new("drawable/ic_a.xml", vec![1u8; 100]).with_timestamp(FIXED),
            ArchiveFile::new("drawable/ic_b.xml", Vec::new()).with_timestamp(FIXED),
            ArchiveFile::new("readme", "x").with_timestamp(FIXED),
        ];
        let archive = build_archive(&files).unwrap();
        let expected: u64 = files
            .iter()
            .map(|f| {
                let n = f.path.len() as u64;
                LOCAL_HEADER_LEN + n + f.data.len() as u64 + CENTRAL_HEADER_LEN + n
            })
            .sum::<u64>()
            + END_RECORD_LEN;
        assert_eq!(archive.len() as u64, expected);
        let offsets: Vec<u32> = archive.entries.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 30 + 17 + 100, 30 + 17 + 100 + 30 + 17]);
        assert_eq!(read_archive(&archive.bytes).len(), 3);
    }

    #[test]
    fn empty_archive_is_just_the_end_record() {
        let archive = build_archive(&[]).unwrap();
        assert_eq!(archive.len() as u64, END_RECORD_LEN);
        assert!(read_archive(&archive.bytes).is_empty());
    }

    #[test]
    fn rebuilding_is_byte_identical() {
        let mut builder = ArchiveBuilder::new();
        for i in 0..20 {
            builder.add_file(
                ArchiveFile::new(format!("dir/file_{}.bin", i), vec![i as u8; i * 3]).with_timestamp(FIXED),
            );
        }
        let first = builder.build().unwrap();
        let second = builder.build().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.sha256_hex(), second.sha256_hex());
        assert_eq!(first.sha256_hex().len(), 64);
    }

    #[test]
    fn separators_are_normalised_and_duplicates_rejected() {
        let archive = build_archive(&[ArchiveFile::new("drawable\\ic_x.xml", "1").with_timestamp(FIXED)])
            .unwrap();
        assert_eq!(archive.entries[0].path, "drawable/ic_x.xml");

        let err = build_archive(&[
            ArchiveFile::new("a/b.xml", "1"),
            ArchiveFile::new("a\\b.xml", "2"),
        ])
        .unwrap_err();
        assert!(matches!(err, VdkitError::DuplicateEntry(ref p) if p == "a/b.xml"));
        assert!(build_archive(&[ArchiveFile::new("", "1")]).is_err());
    }

    #[test]
    fn non_ascii_names_set_utf8_flag() {
        let archive = build_archive(&[ArchiveFile::new("ícone.xml", "1").with_timestamp(FIXED)]).unwrap();
        assert_eq!(u16_at(&archive.bytes, 6), FLAG_UTF8);
        assert_eq!(read_archive(&archive.bytes)[0].0, "ícone.xml");
    }

    #[test]
    fn oversized_layouts_fail_up_front() {
        let err = plan_layout(&[("big.bin", u32::MAX as u64 + 1)]).unwrap_err();
        assert!(matches!(err, VdkitError::SizeOverflow { size, .. } if size == u32::MAX as u64 + 1));

        let err = plan_layout(&[("a", 3_000_000_000), ("b", 2_000_000_000)]).unwrap_err();
        assert!(matches!(err, VdkitError::SizeOverflow { .. }));

        let err = plan_layout(&[("a", u32::MAX as u64 - 40)]).unwrap_err();
        assert!(matches!(err, VdkitError::SizeOverflow { ref what, .. } if what == "archive"));

        let long = "n".repeat(u16::MAX as usize + 1);
        assert!(plan_layout(&[(long.as_str(), 0)]).is_err());

        let many = vec![("x", 0u64); u16::MAX as usize + 1];
        let err = plan_layout(&many).unwrap_err();
        assert!(matches!(err, VdkitError::SizeOverflow { ref what, .. } if what == "entry count"));
    }

    #[test]
    fn dos_time_and_date_packing() {
        let (time, date) = ArchiveTimestamp::new(2023, 11, 14, 22, 13, 20).to_dos();
        assert_eq!(time, (22 << 11) | (13 << 5) | 10);
        assert_eq!(date, (43 << 9) | (11 << 5) | 14);
        assert_eq!(ArchiveTimestamp::new(1975, 6, 1, 1, 1, 1).to_dos(), (0, (1 << 5) | 1));
        assert_eq!(ArchiveTimestamp::new(2200, 1, 1, 0, 0, 0).clamped(), ArchiveTimestamp::MAX);
    }

    #[test]
    fn unix_seconds_to_civil_time() {
        assert_eq!(
            ArchiveTimestamp::from_unix_seconds(1_700_000_000),
            ArchiveTimestamp::new(2023, 11, 14, 22, 13, 20)
        );
        assert_eq!(
            ArchiveTimestamp::from_unix_seconds(951_782_400),
            ArchiveTimestamp::new(2000, 2, 29, 0, 0, 0)
        );
        assert_eq!(ArchiveTimestamp::from_unix_seconds(0), ArchiveTimestamp::MIN);
        assert_eq!(ArchiveTimestamp::from_unix_seconds(-5), ArchiveTimestamp::MIN);
        let now = ArchiveTimestamp::now_utc();
        assert!(now >= ArchiveTimestamp::MIN && now <= ArchiveTimestamp::MAX);
    }

    fn entry_lists() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
        prop::collection::btree_map(
            "[a-z0-9_]{1,12}(/[a-zé]{1,6})?",
            prop::collection::vec(any::<u8>(), 0..256),
            0..16,
        )
        .prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        #[test]
        fn builds_are_deterministic_for_any_entry_list(entries in entry_lists()) {
            let files: Vec<ArchiveFile> = entries
                .iter()
                .map(|(path, data)| ArchiveFile::new(path.clone(), data.clone()).with_timestamp(FIXED))
                .collect();
            let first = build_archive(&files).unwrap();
            let second = build_archive(&files).unwrap();
            prop_assert_eq!(&first.bytes, &second.bytes);
            prop_assert_eq!(first.sha256_hex(), second.sha256_hex());

            let expected: u64 = END_RECORD_LEN
                + entries
                    .iter()
                    .map(|(p, d)| LOCAL_HEADER_LEN + CENTRAL_HEADER_LEN + 2 * p.len() as u64 + d.len() as u64)
                    .sum::<u64>();
            prop_assert_eq!(first.len() as u64, expected);

            let read = read_archive(&first.bytes);
            prop_assert_eq!(read.len(), entries.len());
            for ((name, data, crc), (path, original)) in read.iter().zip(&entries) {
                prop_assert_eq!(name, path);
                prop_assert_eq!(data, original);
                prop_assert_eq!(*crc, bitwise_crc32(original));
            }
        }
    }
}
