use std::io::{self, Read};

use md5::{Digest, Md5};

/// Stream `reader` to the end and return the lowercase hex MD5 of its bytes.
pub fn compute_hash<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Md5::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"))
        }
    }

    #[test]
    fn known_digests() {
        assert_eq!(
            compute_hash(&b""[..]).unwrap(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            compute_hash(&b"abc"[..]).unwrap(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn digest_is_128_bits_of_hex() {
        let hash = compute_hash(&b"db.users.insert({ name: 'admin' })"[..]).unwrap();
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn single_byte_change_changes_hash() {
        let a = compute_hash(&b"db.a.insert({ v: 1 })"[..]).unwrap();
        let b = compute_hash(&b"db.a.insert({ v: 2 })"[..]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn read_errors_propagate() {
        let err = compute_hash(FailingReader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
