use std::{fs, path::Path};

/// Total size in bytes of the files directly inside `dir_path`.
pub fn dir_disk_size<P>(dir_path: P) -> u64
where
  P: AsRef<Path>,
{
  let mut total = 0;
  if let Ok(read_dir) = fs::read_dir(dir_path) {
    for entry in read_dir.flatten() {
      if let Ok(metadata) = entry.metadata() {
        total += metadata.len();
      }
    }
  }
  total
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_dir_disk_size() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(0, dir_disk_size(dir.path()));

    let mut f1 = fs::File::create(dir.path().join("a.data")).unwrap();
    f1.write_all(&[0u8; 128]).unwrap();
    let mut f2 = fs::File::create(dir.path().join("b.data")).unwrap();
    f2.write_all(&[0u8; 64]).unwrap();

    assert_eq!(192, dir_disk_size(dir.path()));
  }
}
