//! lzip 멤버 프레이밍
//!
//! 헤더(6바이트) + raw LZMA1 스트림(종료 마커 포함) + 트레일러(20바이트).
//! LZMA1 본문은 sevenz-rust2가 쓰는 lzma-rust2 코덱으로 만들고, 여기서는 헤더/트레일러와
//! CRC 검증만 담당한다.

use lzma_rust2::{LZMA2Options, LZMAReader, LZMAWriter};
use std::io::{self, Read, Seek, SeekFrom, Take, Write};

const MAGIC: &[u8; 4] = b"LZIP";
const VERSION: u8 = 1;
const HEADER_SIZE: u64 = 6;
const TRAILER_SIZE: u64 = 20;
const MIN_DICT_SIZE: u32 = 1 << 12;
const MAX_DICT_SIZE: u32 = 1 << 29;
const DEFAULT_DICT_LOG2: u8 = 23;

// lzip 본문은 항상 lc=3, lp=0, pb=2
const LITERAL_CONTEXT_BITS: u32 = 3;
const LITERAL_POSITION_BITS: u32 = 0;
const POSITION_BITS: u32 = 2;

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

/// 헤더의 딕셔너리 크기 바이트 해석
///
/// 하위 5비트: 기준 크기의 log2, 상위 3비트: 기준/16 단위로 뺄 양
fn decode_dict_size(coded: u8) -> io::Result<u32> {
    let log2 = u32::from(coded & 0x1F);
    if !(12..=29).contains(&log2) {
        return Err(invalid_data(format!("invalid lzip dictionary size byte {:#04x}", coded)));
    }
    let base = 1u32 << log2;
    let size = base - (base / 16) * u32::from(coded >> 5);
    if !(MIN_DICT_SIZE..=MAX_DICT_SIZE).contains(&size) {
        return Err(invalid_data(format!("lzip dictionary size {} out of range", size)));
    }
    Ok(size)
}

fn encoder_options(level: u32) -> LZMA2Options {
    let mut options = LZMA2Options::with_preset(level.min(9));
    options.dict_size = 1 << DEFAULT_DICT_LOG2;
    options.lc = LITERAL_CONTEXT_BITS;
    options.lp = LITERAL_POSITION_BITS;
    options.pb = POSITION_BITS;
    options
}

/// 출력 바이트 수를 세는 래퍼 (트레일러의 member size 계산용)
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// 단일 멤버 lzip 인코더
pub struct LzipEncoder<W: Write> {
    encoder: LZMAWriter<CountingWriter<W>>,
    crc: crc32fast::Hasher,
    data_size: u64,
}

impl<W: Write> LzipEncoder<W> {
    /// `level`: 0-9 (LZMA 프리셋)
    pub fn new(mut inner: W, level: u32) -> io::Result<Self> {
        inner.write_all(MAGIC)?;
        inner.write_all(&[VERSION, DEFAULT_DICT_LOG2])?;

        let writer = CountingWriter { inner, written: 0 };
        Ok(Self {
            encoder: LZMAWriter::new_no_header(writer, &encoder_options(level), true)?,
            crc: crc32fast::Hasher::new(),
            data_size: 0,
        })
    }

    /// 스트림을 마무리하고 트레일러를 기록한 뒤 내부 writer 반환
    pub fn finish(self) -> io::Result<W> {
        let CountingWriter { mut inner, written } = self.encoder.finish()?;
        let member_size = HEADER_SIZE + written + TRAILER_SIZE;

        inner.write_all(&self.crc.finalize().to_le_bytes())?;
        inner.write_all(&self.data_size.to_le_bytes())?;
        inner.write_all(&member_size.to_le_bytes())?;
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for LzipEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.encoder.write(buf)?;
        self.crc.update(&buf[..n]);
        self.data_size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

/// 단일 멤버 lzip 디코더
///
/// 트레일러를 먼저 읽기 위해 Seek 가능한 입력이 필요하다. 스트림 끝에서 CRC와 크기를 검증한다.
pub struct LzipDecoder<R: Read> {
    decoder: LZMAReader<Take<R>>,
    crc: crc32fast::Hasher,
    data_size: u64,
    expected_crc: u32,
    expected_size: u64,
    verified: bool,
}

impl<R: Read + Seek> LzipDecoder<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let total_len = inner.seek(SeekFrom::End(0))?;
        if total_len < HEADER_SIZE + TRAILER_SIZE {
            return Err(invalid_data("file is too short to be lzip"));
        }

        inner.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; HEADER_SIZE as usize];
        inner.read_exact(&mut header)?;
        if &header[..4] != MAGIC {
            return Err(invalid_data("bad lzip magic"));
        }
        if header[4] != VERSION {
            return Err(invalid_data(format!("unsupported lzip version {}", header[4])));
        }
        let dict_size = decode_dict_size(header[5])?;

        inner.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
        let mut trailer = [0u8; TRAILER_SIZE as usize];
        inner.read_exact(&mut trailer)?;
        let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let expected_size = u64::from_le_bytes(slice8(&trailer[4..12]));
        let member_size = u64::from_le_bytes(slice8(&trailer[12..20]));
        if member_size != total_len {
            return Err(invalid_data(
                "multi-member or trailing data in lzip file is not supported",
            ));
        }

        inner.seek(SeekFrom::Start(HEADER_SIZE))?;
        let body = inner.take(total_len - HEADER_SIZE - TRAILER_SIZE);
        // 크기를 모르므로 종료 마커까지 읽는다
        let decoder = LZMAReader::new(
            body,
            u64::MAX,
            LITERAL_CONTEXT_BITS,
            LITERAL_POSITION_BITS,
            POSITION_BITS,
            dict_size,
            None,
        )?;

        Ok(Self {
            decoder,
            crc: crc32fast::Hasher::new(),
            data_size: 0,
            expected_crc,
            expected_size,
            verified: false,
        })
    }
}

fn slice8(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    out
}

impl<R: Read> LzipDecoder<R> {
    fn verify(&mut self) -> io::Result<()> {
        if self.verified {
            return Ok(());
        }
        self.verified = true;
        if self.data_size != self.expected_size {
            return Err(invalid_data(format!(
                "lzip data size mismatch: expected {}, got {}",
                self.expected_size, self.data_size
            )));
        }
        let actual = self.crc.clone().finalize();
        if actual != self.expected_crc {
            return Err(invalid_data(format!(
                "lzip CRC mismatch: expected {:08x}, got {:08x}",
                self.expected_crc, actual
            )));
        }
        Ok(())
    }
}

impl<R: Read> Read for LzipDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.verify()?;
            return Ok(0);
        }
        self.crc.update(&buf[..n]);
        self.data_size += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(data: &[u8]) -> Vec<u8> {
        let mut encoder = LzipEncoder::new(Vec::new(), 6).unwrap();
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn decode(bytes: Vec<u8>) -> io::Result<Vec<u8>> {
        let mut decoder = LzipDecoder::new(Cursor::new(bytes))?;
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_header_and_trailer_layout() {
        let data = b"hello lzip hello lzip hello lzip";
        let bytes = encode(data);

        assert_eq!(&bytes[..4], b"LZIP");
        assert_eq!(bytes[4], 1);
        assert_eq!(decode_dict_size(bytes[5]).unwrap(), 1 << 23);

        let len = bytes.len();
        let crc = u32::from_le_bytes([bytes[len - 20], bytes[len - 19], bytes[len - 18], bytes[len - 17]]);
        assert_eq!(crc, crc32fast::hash(data));
        let data_size = u64::from_le_bytes(slice8(&bytes[len - 16..len - 8]));
        assert_eq!(data_size, data.len() as u64);
        let member_size = u64::from_le_bytes(slice8(&bytes[len - 8..]));
        assert_eq!(member_size, len as u64);
    }

    #[test]
    fn test_decode_restores_data() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(decode(encode(&data)).unwrap(), data);
    }

    #[test]
    fn test_decode_empty_payload() {
        assert!(decode(encode(b"")).unwrap().is_empty());
    }

    /// liblzma raw LZMA1 인코더로 만든 lzip 파일 (딕셔너리 4 KiB)
    const LIBLZMA_MEMBER: [u8; 70] = [
        0x4c, 0x5a, 0x49, 0x50, 0x01, 0x0c, 0x00, 0x36, 0x1e, 0x89, 0x56, 0xb0,
        0xdb, 0xf4, 0xac, 0xf6, 0x95, 0xac, 0xab, 0xcf, 0xd8, 0x51, 0xb4, 0x62,
        0x8f, 0x09, 0x2e, 0x89, 0x94, 0xd0, 0x0b, 0x95, 0x5b, 0x9b, 0x92, 0xf5,
        0x2d, 0x0d, 0xd0, 0x63, 0xb9, 0xe7, 0x19, 0x09, 0xff, 0xff, 0xfd, 0x0f,
        0xe0, 0x00, 0x36, 0x29, 0xa2, 0xc5, 0x5d, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x46, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn test_decode_member_from_other_encoder() {
        let out = decode(LIBLZMA_MEMBER.to_vec()).unwrap();
        assert_eq!(out, b"lzip member written by liblzma\n".repeat(3));
    }

    #[test]
    fn test_encoded_body_is_raw_lzma1() {
        // raw LZMA1 본문은 레인지 코더 초기 바이트 0으로 시작하고, .lzma 헤더(13바이트)가 없다
        let data = b"raw body raw body raw body";
        let bytes = encode(data);
        assert_eq!(bytes[6], 0x00);

        let body = &bytes[6..bytes.len() - 20];
        let mut reader = LZMAReader::new(body, u64::MAX, 3, 0, 2, 1 << 23, None).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let mut bytes = encode(b"payload");
        bytes[0] = b'X';
        let err = decode(bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_crc_mismatch_is_rejected() {
        let mut bytes = encode(b"payload payload payload");
        let len = bytes.len();
        bytes[len - 20] ^= 0xFF;
        let err = decode(bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_dict_size_decoding() {
        assert_eq!(decode_dict_size(12).unwrap(), 4096);
        assert_eq!(decode_dict_size(23).unwrap(), 8 * 1024 * 1024);
        // 2^20 - 2^20/16 * 1
        assert_eq!(decode_dict_size(0x20 | 20).unwrap(), (1 << 20) - (1 << 16));
        assert!(decode_dict_size(11).is_err());
        assert!(decode_dict_size(30).is_err());
    }
}
