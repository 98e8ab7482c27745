//! Log-structured key/value store.
//!
//! Each record is a big-endian u32 record size, the key, a zero byte and the
//! value. Erased storage reads as all ones. The last record for a key wins and
//! an empty value removes the key. The whole store is mirrored in RAM; writes
//! go to both.

use core::{fmt, str};
use core::fmt::Write;
use byteorder::{BigEndian, ByteOrder};

pub trait Storage {
    type Error;

    fn capacity(&self) -> usize;
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error>;
    /// Sets the whole storage to 0xff.
    fn erase(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    Storage(E),
    SpaceExhausted,
    Truncated { offset: usize },
    InvalidSize { offset: usize, size: usize },
    MissingSeparator { offset: usize },
    Utf8Error(str::Utf8Error),
    InvalidInt,
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Error::Storage(ref err) =>
                write!(f, "storage error: {:?}", err),
            &Error::SpaceExhausted =>
                write!(f, "space exhausted"),
            &Error::Truncated { offset } =>
                write!(f, "truncated record at offset {}", offset),
            &Error::InvalidSize { offset, size } =>
                write!(f, "invalid record size {} at offset {}", size, offset),
            &Error::MissingSeparator { offset } =>
                write!(f, "missing separator at offset {}", offset),
            &Error::Utf8Error(err) =>
                write!(f, "{}", err),
            &Error::InvalidInt =>
                write!(f, "value is not an integer"),
        }
    }
}

impl<E> Error<E> {
    pub fn map_storage<F, G: FnOnce(E) -> F>(self, f: G) -> Error<F> {
        match self {
            Error::Storage(err) => Error::Storage(f(err)),
            Error::SpaceExhausted => Error::SpaceExhausted,
            Error::Truncated { offset } => Error::Truncated { offset: offset },
            Error::InvalidSize { offset, size } => Error::InvalidSize { offset: offset, size: size },
            Error::MissingSeparator { offset } => Error::MissingSeparator { offset: offset },
            Error::Utf8Error(err) => Error::Utf8Error(err),
            Error::InvalidInt => Error::InvalidInt,
        }
    }
}

struct FmtWrapper<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> FmtWrapper<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        FmtWrapper {
            buf: buf,
            offset: 0,
        }
    }

    fn contents(&self) -> &[u8] {
        &self.buf[..self.offset]
    }
}

impl<'a> fmt::Write for FmtWrapper<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remainder = &mut self.buf[self.offset..];
        if remainder.len() < bytes.len() {
            return Err(fmt::Error)
        }
        remainder[..bytes.len()].copy_from_slice(bytes);
        self.offset += bytes.len();
        Ok(())
    }
}

#[derive(Clone)]
pub struct Iter<'a> {
    data:   &'a [u8],
    offset: usize,
}

impl<'a> Iter<'a> {
    fn new(data: &'a [u8]) -> Iter<'a> {
        Iter { data: data, offset: 0 }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<(&'a [u8], &'a [u8]), (usize, RecordError)>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = &self.data[self.offset..];
        if data.is_empty() {
            return None
        }
        if data.len() < 4 {
            // too short for a record, fine if still erased
            if data.iter().all(|&x| x == 0xff) {
                return None
            }
            return Some(Err((self.offset, RecordError::Truncated)))
        }

        let record_size = BigEndian::read_u32(data) as usize;
        if record_size == 0xffff_ffff {
            return None
        } else if record_size < 4 || record_size > data.len() {
            return Some(Err((self.offset, RecordError::InvalidSize(record_size))))
        }

        let record_body = &data[4..record_size];
        match record_body.iter().position(|&x| x == 0) {
            None => Some(Err((self.offset, RecordError::MissingSeparator))),
            Some(pos) => {
                self.offset += record_size;
                let (key, zero_and_value) = record_body.split_at(pos);
                Some(Ok((key, &zero_and_value[1..])))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    Truncated,
    InvalidSize(usize),
    MissingSeparator,
}

impl RecordError {
    fn at<E>(self, offset: usize) -> Error<E> {
        match self {
            RecordError::Truncated => Error::Truncated { offset: offset },
            RecordError::InvalidSize(size) => Error::InvalidSize { offset: offset, size: size },
            RecordError::MissingSeparator => Error::MissingSeparator { offset: offset },
        }
    }
}

fn check<'a, E>(item: Result<(&'a [u8], &'a [u8]), (usize, RecordError)>)
               -> Result<(&'a [u8], &'a [u8]), Error<E>> {
    item.map_err(|(offset, err)| err.at(offset))
}

/// Store over the first `N` bytes of `S`.
pub struct Config<S, const N: usize> {
    storage: S,
    image: [u8; N],
    len: usize,
}

impl<S: Storage, const N: usize> Config<S, N> {
    pub fn load(mut storage: S) -> Result<Config<S, N>, Error<S::Error>> {
        let len = N.min(storage.capacity());
        let mut image = [0xff; N];
        storage.read(0, &mut image[..len]).map_err(Error::Storage)?;
        Ok(Config { storage: storage, image: image, len: len })
    }

    pub fn release(self) -> S {
        self.storage
    }

    pub fn iter(&self) -> Iter {
        Iter::new(&self.image[..self.len])
    }

    pub fn read(&self, key: &str) -> Result<&[u8], Error<S::Error>> {
        let mut value = &[][..];
        for item in self.iter() {
            let (record_key, record_value) = check(item)?;
            if key.as_bytes() == record_key {
                // last write wins
                value = record_value
            }
        }
        Ok(value)
    }

    pub fn read_str(&self, key: &str) -> Result<&str, Error<S::Error>> {
        self.read(key).and_then(|value| str::from_utf8(value).map_err(Error::Utf8Error))
    }

    /// `Ok(None)` if the key is absent.
    pub fn read_int(&self, key: &str) -> Result<Option<u32>, Error<S::Error>> {
        let value = self.read_str(key)?;
        if value.is_empty() {
            return Ok(None)
        }
        value.trim().parse().map(Some).map_err(|_| Error::InvalidInt)
    }

    fn append_at(&mut self, offset: usize, key: &[u8], value: &[u8])
                -> Result<usize, Error<S::Error>> {
        let record_size = 4 + key.len() + 1 + value.len();
        if offset + record_size > self.len {
            return Err(Error::SpaceExhausted)
        }

        let record = &mut self.image[offset..offset + record_size];
        BigEndian::write_u32(&mut record[..4], record_size as u32);
        record[4..4 + key.len()].copy_from_slice(key);
        record[4 + key.len()] = 0;
        record[5 + key.len()..].copy_from_slice(value);

        self.storage.write(offset, record).map_err(Error::Storage)?;
        Ok(offset + record_size)
    }

    fn free_offset(&self) -> Result<usize, Error<S::Error>> {
        let mut iter = self.iter();
        while let Some(item) = iter.next() {
            check(item)?;
        }
        Ok(iter.offset)
    }

    fn compact(&mut self) -> Result<(), Error<S::Error>> {
        let old = self.image;
        self.image = [0xff; N];
        self.storage.erase().map_err(Error::Storage)?;

        // Quadratic, but the store is a single small page range.
        let mut offset = 0;
        let mut iter = Iter::new(&old[..self.len]);
        'iter: while let Some(item) = iter.next() {
            let (key, value) = check(item)?;
            if value.is_empty() {
                continue
            }

            let mut next_iter = iter.clone();
            while let Some(next_item) = next_iter.next() {
                let (next_key, _) = check(next_item)?;
                if key == next_key {
                    continue 'iter
                }
            }
            offset = self.append_at(offset, key, value)?;
        }
        debug!("config compacted, {} of {} bytes used", offset, self.len);
        Ok(())
    }

    fn append(&mut self, key: &str, value: &[u8]) -> Result<(), Error<S::Error>> {
        let offset = self.free_offset()?;
        self.append_at(offset, key.as_bytes(), value)?;
        Ok(())
    }

    pub fn write(&mut self, key: &str, value: &[u8]) -> Result<(), Error<S::Error>> {
        match self.append(key, value) {
            Err(Error::SpaceExhausted) => {
                self.compact()?;
                self.append(key, value)
            }
            res => res
        }
    }

    pub fn write_int(&mut self, key: &str, value: u32) -> Result<(), Error<S::Error>> {
        let mut buf = [0; 16];
        let mut wrapper = FmtWrapper::new(&mut buf);
        // ten digits at most
        let _ = write!(&mut wrapper, "{}", value);
        let len = wrapper.contents().len();
        self.write(key, &buf[..len])
    }

    pub fn remove(&mut self, key: &str) -> Result<(), Error<S::Error>> {
        self.write(key, &[])
    }

    pub fn erase(&mut self) -> Result<(), Error<S::Error>> {
        self.image = [0xff; N];
        self.storage.erase().map_err(Error::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemStorage;

    #[test]
    fn last_write_wins() {
        let mut config: Config<_, 256> = Config::load(MemStorage::new(256)).unwrap();
        config.write("fpga_ref_khz", b"100000").unwrap();
        config.write("fpga_ref_khz", b"125000").unwrap();
        assert_eq!(config.read_str("fpga_ref_khz").unwrap(), "125000");
        assert_eq!(config.read_int("fpga_ref_khz").unwrap(), Some(125000));
    }

    #[test]
    fn missing_key_is_empty() {
        let config: Config<_, 64> = Config::load(MemStorage::new(64)).unwrap();
        assert_eq!(config.read("absent").unwrap(), b"");
        assert_eq!(config.read_int("absent").unwrap(), None);
    }

    #[test]
    fn remove_and_reload() {
        let mut config: Config<_, 128> = Config::load(MemStorage::new(128)).unwrap();
        config.write_int("lane_rate_khz", 10_000_000).unwrap();
        config.write("mac", &[1, 2, 3]).unwrap();
        config.remove("mac").unwrap();

        let config: Config<_, 128> = Config::load(config.release()).unwrap();
        assert_eq!(config.read_int("lane_rate_khz").unwrap(), Some(10_000_000));
        assert_eq!(config.read("mac").unwrap(), b"");
    }

    #[test]
    fn compacts_when_full() {
        let mut config: Config<_, 64> = Config::load(MemStorage::new(64)).unwrap();
        // 4 + 1 + 1 + 8 = 14 bytes per record, four fit
        for i in 0..10u32 {
            config.write("k", &[b'0' + i as u8; 8]).unwrap();
        }
        assert_eq!(config.read("k").unwrap(), &[b'9'; 8]);
        // compacted after the 4th and 7th write
        assert_eq!(config.iter().count(), 4);
    }

    #[test]
    fn short_erased_tail() {
        let mut config: Config<_, 32> = Config::load(MemStorage::new(32)).unwrap();
        // 14 + 16 bytes, two erased bytes left
        config.write("k", &[b'a'; 8]).unwrap();
        config.write("k", &[b'b'; 10]).unwrap();
        assert_eq!(config.read("k").unwrap(), &[b'b'; 10]);
        // needs a compaction, which drops the first record
        config.write("k", b"b").unwrap();
        assert_eq!(config.read("k").unwrap(), b"b");
        assert_eq!(config.iter().count(), 2);

        let config: Config<_, 32> = Config::load(config.release()).unwrap();
        assert_eq!(config.read("k").unwrap(), b"b");
    }

    #[test]
    fn short_tail_not_erased() {
        let mut storage = MemStorage::new(32);
        storage.data_mut()[..30].copy_from_slice(b"\x00\x00\x00\x1ek\x00aaaaaaaaaaaaaaaaaaaaaaaa");
        storage.data_mut()[30] = 0x00;
        let config: Config<_, 32> = Config::load(storage).unwrap();
        assert_eq!(config.read("k"), Err(Error::Truncated { offset: 30 }));
    }

    #[test]
    fn oversized_record_exhausts_space() {
        let mut config: Config<_, 32> = Config::load(MemStorage::new(32)).unwrap();
        assert_eq!(config.write("key", &[0; 40]), Err(Error::SpaceExhausted));
    }

    #[test]
    fn corrupted_size_reported() {
        let mut storage = MemStorage::new(32);
        storage.data_mut()[..4].copy_from_slice(&[0, 0, 0, 2]);
        let config: Config<_, 32> = Config::load(storage).unwrap();
        assert_eq!(config.read("x"), Err(Error::InvalidSize { offset: 0, size: 2 }));
    }

    #[test]
    fn invalid_int() {
        let mut config: Config<_, 64> = Config::load(MemStorage::new(64)).unwrap();
        config.write("xcvr_sys_clk_sel", b"qpll").unwrap();
        assert_eq!(config.read_int("xcvr_sys_clk_sel"), Err(Error::InvalidInt));
    }
}
