use md5::{Digest, Md5};
use std::{fs::File, io::Read, path::Path};

use crate::error::Result;

/// Compute the MD5 content checksum of a file as lowercase hex.
///
/// MD5 is what cloud drives report for stored files, so local and remote
/// checksums can be compared directly.
pub fn compute_checksum<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut file = File::open(&path)?;
    let mut hasher = Md5::new();

    // Read the file in chunks and update the hasher
    let mut buffer = [0; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_known_digests() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.jpg");
        let abc = dir.path().join("abc.jpg");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&abc, b"abc").unwrap();

        assert_eq!(
            compute_checksum(&empty).unwrap(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            compute_checksum(&abc).unwrap(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(compute_checksum("/definitely/not/here.jpg").is_err());
    }
}
